//! Argument extraction and parsing from free-text oracle replies.
//!
//! The oracle is asked to answer with an `ARGUMENTS:` line, but replies may
//! be prose, partial, or bare payloads. Extraction tries a fixed ladder of
//! strategies; per-operation parsing then decodes the payload into typed
//! [`OpArgs`], recovering common near-JSON shapes where the reference
//! behavior does.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::core::error::Error;
use crate::core::ops::{OpArgs, Operation};
use crate::core::table::Value;

/// Marker the argument prompt instructs the oracle to emit.
const ARGS_MARKER: &str = "ARGUMENTS:";

/// Line fragments that mark explanation rather than payload.
const SKIP_FRAGMENTS: [&str; 4] = ["→", "arguments", "operation", "table:"];

static INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).unwrap());
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

/// Parse an oracle reply into typed arguments for `operation`.
///
/// `operation` is the wire token from the plan selector. Tokens outside the
/// known algebra get the generic cleanup treatment and come back as
/// [`OpArgs::Raw`]; applying those leaves the table untouched. `row_count`
/// is only used to word AddColumn failures.
pub fn parse_args(reply: &str, operation: &str, row_count: usize) -> Result<OpArgs, Error> {
    let payload = extract_payload(reply).ok_or_else(|| Error::MissingArguments {
        operation: operation.to_string(),
        detail: format!("no usable payload in oracle reply {reply:?}"),
    })?;

    match Operation::from_token(operation) {
        Some(Operation::AddColumn) => parse_add_column(&payload, row_count),
        Some(Operation::SelectRow) => Ok(parse_select_row(&payload)),
        Some(Operation::SelectColumn) => parse_select_column(&payload),
        Some(Operation::GroupBy) => parse_group_by(&payload),
        Some(Operation::SortBy) => parse_sort_by(&payload),
        None => Ok(OpArgs::Raw(strip_decoration(&payload))),
    }
}

/// Pull the argument payload out of a raw oracle reply.
///
/// Strategies in order, first match wins: an `ARGUMENTS:`-marked line with a
/// non-empty remainder; the whole reply when it is a single line; the first
/// line that looks structurally like a value (starts with a bracket or
/// quote); the last non-empty line that is not an explanatory phrase.
fn extract_payload(reply: &str) -> Option<String> {
    let reply = reply.trim();
    let lines: Vec<&str> = reply.lines().collect();

    for line in &lines {
        if let Some((_, rest)) = line.split_once(ARGS_MARKER) {
            let rest = rest.trim();
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }

    if lines.len() == 1 && !lines[0].trim().is_empty() {
        return Some(lines[0].trim().to_string());
    }

    for line in &lines {
        let line = line.trim();
        if line.len() > 2 && (line.starts_with('[') || line.starts_with('"')) {
            return Some(line.to_string());
        }
    }

    for line in lines.iter().rev() {
        let line = line.trim();
        if line.len() > 1 && !is_explanatory(line) {
            return Some(line.to_string());
        }
    }

    None
}

fn is_explanatory(line: &str) -> bool {
    let lower = line.to_lowercase();
    SKIP_FRAGMENTS.iter().any(|fragment| lower.contains(fragment))
}

/// AddColumn requires `[name, values]`: the chain depends on exact cell
/// values, so a bare column name is refused rather than defaulted.
fn parse_add_column(payload: &str, row_count: usize) -> Result<OpArgs, Error> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(payload) {
        return add_column_from_json(json, payload, row_count);
    }

    // Manual recovery of a `[name, [v1, v2, ...]]` pattern that is not quite
    // valid JSON (single quotes, stray text).
    if payload.contains('[') && payload.contains(',') {
        let inner = payload
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']');
        if let Some((name_part, values_part)) = inner.split_once(',') {
            let name = strip_quotes(name_part);
            let values_part = values_part.trim();
            let values = if values_part.starts_with('[') {
                values_part
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .split(',')
                    .map(|value| Value::text(strip_quotes(value)))
                    .collect()
            } else {
                vec![Value::text(strip_quotes(values_part))]
            };
            return Ok(OpArgs::AddColumn {
                name,
                values: Some(values),
                default: Value::text(""),
            });
        }
    }

    Err(Error::MissingArguments {
        operation: Operation::AddColumn.token().to_string(),
        detail: format!(
            "column name without values is insufficient for {}; one value per row is required ({row_count} rows)",
            Operation::AddColumn.token()
        ),
    })
}

fn add_column_from_json(
    json: serde_json::Value,
    payload: &str,
    row_count: usize,
) -> Result<OpArgs, Error> {
    let name_only = || Error::MissingArguments {
        operation: Operation::AddColumn.token().to_string(),
        detail: format!(
            "column name without values is insufficient for {}; one value per row is required ({row_count} rows)",
            Operation::AddColumn.token()
        ),
    };

    match json {
        serde_json::Value::Array(items) if items.len() >= 2 => {
            let name = json_to_text(&items[0]);
            let values = match &items[1] {
                serde_json::Value::Array(raw) => raw
                    .iter()
                    .map(json_to_value)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|reason| Error::ParseFailure {
                        operation: Operation::AddColumn.token().to_string(),
                        payload: payload.to_string(),
                        reason,
                    })?,
                other => vec![json_to_value(other).map_err(|reason| Error::ParseFailure {
                    operation: Operation::AddColumn.token().to_string(),
                    payload: payload.to_string(),
                    reason,
                })?],
            };
            Ok(OpArgs::AddColumn {
                name,
                values: Some(values),
                default: Value::text(""),
            })
        }
        _ => Err(name_only()),
    }
}

/// Scrape every integer substring out of the payload.
///
/// An empty scrape falls back to `[1, 2, 3]`. The fallback mirrors the
/// reference behavior and is logged as a warning; it is a recovery default,
/// not a successful parse.
fn parse_select_row(payload: &str) -> OpArgs {
    let indices: Vec<i64> = INT_RE
        .find_iter(payload)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    if indices.is_empty() {
        warn!(payload, "no row indices in payload; falling back to [1, 2, 3]");
        return OpArgs::SelectRow(vec![1, 2, 3]);
    }
    OpArgs::SelectRow(indices)
}

fn parse_select_column(payload: &str) -> Result<OpArgs, Error> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(payload) {
        let names = match json {
            serde_json::Value::Array(items) => items.iter().map(json_to_text).collect(),
            other => vec![json_to_text(&other)],
        };
        return Ok(OpArgs::SelectColumn(names));
    }

    if payload.contains('[') {
        let names: Vec<String> = QUOTED_RE
            .captures_iter(payload)
            .map(|captures| captures[1].to_string())
            .collect();
        if !names.is_empty() {
            return Ok(OpArgs::SelectColumn(names));
        }
    } else {
        let name = strip_decoration(payload);
        if !name.is_empty() {
            return Ok(OpArgs::SelectColumn(vec![name]));
        }
    }

    Err(Error::ParseFailure {
        operation: Operation::SelectColumn.token().to_string(),
        payload: payload.to_string(),
        reason: "no column names in payload".to_string(),
    })
}

fn parse_group_by(payload: &str) -> Result<OpArgs, Error> {
    let name = strip_decoration(payload);
    if name.is_empty() {
        return Err(Error::ParseFailure {
            operation: Operation::GroupBy.token().to_string(),
            payload: payload.to_string(),
            reason: "no column name in payload".to_string(),
        });
    }
    Ok(OpArgs::GroupBy {
        name,
        count_column: "Count".to_string(),
    })
}

fn parse_sort_by(payload: &str) -> Result<OpArgs, Error> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(payload) {
        return Ok(match json {
            serde_json::Value::Array(items) if !items.is_empty() => OpArgs::SortBy {
                name: json_to_text(&items[0]),
                ascending: items.get(1).map(json_ascending).unwrap_or(true),
            },
            other => OpArgs::SortBy {
                name: json_to_text(&other),
                ascending: true,
            },
        });
    }

    if let Some(found) = WORD_RE.find(payload) {
        return Ok(OpArgs::SortBy {
            name: found.as_str().to_string(),
            ascending: !payload_means_descending(payload),
        });
    }

    Err(Error::ParseFailure {
        operation: Operation::SortBy.token().to_string(),
        payload: payload.to_string(),
        reason: "no sort column in payload".to_string(),
    })
}

fn json_ascending(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(flag) => *flag,
        serde_json::Value::String(text) => !payload_means_descending(text),
        serde_json::Value::Number(number) => number.as_f64() != Some(0.0),
        _ => true,
    }
}

fn payload_means_descending(payload: &str) -> bool {
    let lower = payload.to_lowercase();
    ["desc", "descending", "false"]
        .iter()
        .any(|token| lower.contains(token))
}

fn json_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn json_to_value(value: &serde_json::Value) -> Result<Value, String> {
    match value {
        serde_json::Value::String(text) => Ok(Value::text(text.clone())),
        serde_json::Value::Number(number) => {
            if let Some(n) = number.as_i64() {
                Ok(Value::Int(n))
            } else if let Some(x) = number.as_f64() {
                Ok(Value::Float(x))
            } else {
                Err(format!("unrepresentable number {number}"))
            }
        }
        serde_json::Value::Bool(flag) => Ok(Value::text(flag.to_string())),
        serde_json::Value::Null => Ok(Value::text("")),
        nested => Err(format!("nested structures are not scalar cell values: {nested}")),
    }
}

fn strip_quotes(text: &str) -> String {
    text.trim().trim_matches(['"', '\'']).to_string()
}

/// Generic cleanup: trim quote and bracket decoration off a payload.
fn strip_decoration(payload: &str) -> String {
    payload
        .trim()
        .trim_matches(['"', '\'', '[', ']', '{', '}', ' '])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_line_wins_over_everything() {
        let reply = "Let me think about the table.\nARGUMENTS: [1, 2]\nExplanation follows.";
        let args = parse_args(reply, "f_select_row", 3).expect("parse");
        assert_eq!(args, OpArgs::SelectRow(vec![1, 2]));
    }

    #[test]
    fn single_line_reply_is_the_payload() {
        let args = parse_args("Country", "f_group_by", 3).expect("parse");
        assert_eq!(
            args,
            OpArgs::GroupBy {
                name: "Country".to_string(),
                count_column: "Count".to_string(),
            }
        );
    }

    #[test]
    fn value_like_line_is_picked_from_prose() {
        let reply = "I will select these columns.\n[\"Rank\", \"Cyclist\"]\nThat narrows the table.";
        let args = parse_args(reply, "f_select_column", 3).expect("parse");
        assert_eq!(
            args,
            OpArgs::SelectColumn(vec!["Rank".to_string(), "Cyclist".to_string()])
        );
    }

    #[test]
    fn empty_reply_is_missing_arguments() {
        let err = parse_args("", "f_group_by", 3).expect_err("must fail");
        assert!(matches!(err, Error::MissingArguments { operation, .. } if operation == "f_group_by"));
    }

    #[test]
    fn add_column_parses_name_and_values() {
        let args =
            parse_args(r#"ARGUMENTS: ["Country", ["ESP", "ITA"]]"#, "f_add_column", 2).expect("parse");
        assert_eq!(
            args,
            OpArgs::AddColumn {
                name: "Country".to_string(),
                values: Some(vec![Value::text("ESP"), Value::text("ITA")]),
                default: Value::text(""),
            }
        );
    }

    /// Column creation must be fully specified by the oracle; later steps
    /// depend on exact cell values.
    #[test]
    fn add_column_name_only_is_missing_arguments() {
        let err = parse_args(r#"["Country"]"#, "f_add_column", 3).expect_err("must fail");
        assert!(matches!(
            err,
            Error::MissingArguments { operation, detail }
                if operation == "f_add_column" && detail.contains("without values")
        ));
    }

    #[test]
    fn add_column_recovers_non_json_list() {
        let args = parse_args("['Country', ['ESP', 'ITA']]", "f_add_column", 2).expect("parse");
        assert_eq!(
            args,
            OpArgs::AddColumn {
                name: "Country".to_string(),
                values: Some(vec![Value::text("ESP"), Value::text("ITA")]),
                default: Value::text(""),
            }
        );
    }

    #[test]
    fn add_column_keeps_numeric_value_types() {
        let args = parse_args(r#"["Age", [25, 28.5]]"#, "f_add_column", 2).expect("parse");
        assert_eq!(
            args,
            OpArgs::AddColumn {
                name: "Age".to_string(),
                values: Some(vec![Value::Int(25), Value::Float(28.5)]),
                default: Value::text(""),
            }
        );
    }

    #[test]
    fn select_row_scrapes_integers_from_prose() {
        let args = parse_args("rows 1, 2 and 3", "f_select_row", 5).expect("parse");
        assert_eq!(args, OpArgs::SelectRow(vec![1, 2, 3]));
    }

    #[test]
    fn select_row_without_digits_uses_documented_fallback() {
        let args = parse_args("the first few rows", "f_select_row", 5).expect("parse");
        assert_eq!(args, OpArgs::SelectRow(vec![1, 2, 3]));
    }

    #[test]
    fn select_column_accepts_bare_name() {
        let args = parse_args("Cyclist", "f_select_column", 3).expect("parse");
        assert_eq!(args, OpArgs::SelectColumn(vec!["Cyclist".to_string()]));
    }

    #[test]
    fn select_column_extracts_quoted_names_from_loose_list() {
        let args = parse_args("['Name', 'Country']", "f_select_column", 3).expect("parse");
        assert_eq!(
            args,
            OpArgs::SelectColumn(vec!["Name".to_string(), "Country".to_string()])
        );
    }

    #[test]
    fn group_by_strips_decoration() {
        let args = parse_args("\"Country\"", "f_group_by", 3).expect("parse");
        assert_eq!(
            args,
            OpArgs::GroupBy {
                name: "Country".to_string(),
                count_column: "Count".to_string(),
            }
        );
    }

    #[test]
    fn sort_by_json_pair_controls_direction() {
        let args = parse_args(r#"["Count", false]"#, "f_sort_by", 3).expect("parse");
        assert_eq!(
            args,
            OpArgs::SortBy {
                name: "Count".to_string(),
                ascending: false,
            }
        );
    }

    #[test]
    fn sort_by_bare_name_defaults_ascending() {
        let args = parse_args(r#""Rank""#, "f_sort_by", 3).expect("parse");
        assert_eq!(
            args,
            OpArgs::SortBy {
                name: "Rank".to_string(),
                ascending: true,
            }
        );
    }

    #[test]
    fn sort_by_recognizes_descending_tokens() {
        let args = parse_args("Count descending", "f_sort_by", 3).expect("parse");
        assert_eq!(
            args,
            OpArgs::SortBy {
                name: "Count".to_string(),
                ascending: false,
            }
        );
    }

    #[test]
    fn unknown_operation_token_becomes_raw() {
        let args = parse_args("[\"pivot\"]", "f_transpose", 3).expect("parse");
        assert_eq!(args, OpArgs::Raw("pivot".to_string()));
    }
}
