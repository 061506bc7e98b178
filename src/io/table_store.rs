//! Table and result persistence: JSON and CSV files.
//!
//! Tables persist as a JSON array of flat objects (one per row) or as CSV
//! with a header row. CSV cells are opportunistically coerced on load:
//! values with a decimal point parse as reals, other values as integers,
//! anything else stays text.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use serde::Serialize;

use crate::core::chain::Chain;
use crate::core::table::{Row, Table, Value};
use crate::reason::ReasonOutcome;

/// Load a table from a `.json` or `.csv` file, chosen by extension.
pub fn load_table(path: &Path) -> Result<Table> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    match extension(path).as_str() {
        "json" => {
            serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
        }
        "csv" => parse_csv(&contents).with_context(|| format!("parse {}", path.display())),
        other => bail!(
            "unsupported table format '{other}' for {} (use .json or .csv)",
            path.display()
        ),
    }
}

/// Save a table to a `.json` or `.csv` file, chosen by extension.
pub fn save_table(table: &Table, path: &Path) -> Result<()> {
    let contents = match extension(path).as_str() {
        "json" => {
            let mut payload = serde_json::to_string_pretty(table).context("serialize table")?;
            payload.push('\n');
            payload
        }
        "csv" => render_csv(table),
        other => bail!(
            "unsupported table format '{other}' for {} (use .json or .csv)",
            path.display()
        ),
    };
    write_with_parents(path, &contents)
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Coerce a CSV cell: a decimal point means a real, otherwise an integer,
/// otherwise text.
fn coerce_scalar(field: &str) -> Value {
    if field.contains('.') {
        if let Ok(real) = field.parse::<f64>() {
            return Value::Float(real);
        }
    } else if let Ok(integer) = field.parse::<i64>() {
        return Value::Int(integer);
    }
    Value::text(field)
}

fn parse_csv(contents: &str) -> Result<Table> {
    let mut records = csv_records(contents)?;
    if records.is_empty() {
        return Ok(Table::new());
    }
    let header = records.remove(0);

    let rows = records
        .into_iter()
        .map(|record| {
            let mut row = Row::new();
            for (index, column) in header.iter().enumerate() {
                let field = record.get(index).map(String::as_str).unwrap_or("");
                row.set(column.clone(), coerce_scalar(field));
            }
            row
        })
        .collect();
    Ok(Table::from_rows(rows))
}

/// Minimal quoted-field CSV reader: commas separate fields, `"` quotes a
/// field, `""` inside quotes is a literal quote, records end at newlines.
fn csv_records(contents: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = contents.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(ch),
            }
            continue;
        }
        match ch {
            '"' => in_quotes = true,
            ',' => {
                record.push(std::mem::take(&mut field));
                // A trailing comma still opens one more (empty) field.
            }
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if record.len() > 1 || !record[0].is_empty() {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(ch),
        }
    }
    if in_quotes {
        return Err(anyhow!("unterminated quoted field"));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

fn render_csv(table: &Table) -> String {
    let columns = table.schema();
    let mut lines = Vec::with_capacity(table.len() + 1);
    lines.push(
        columns
            .iter()
            .map(|column| csv_field(column))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in table.rows() {
        let fields: Vec<String> = columns
            .iter()
            .map(|column| csv_field(&row.get_or_empty(column).to_string()))
            .collect();
        lines.push(fields.join(","));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn csv_field(text: &str) -> String {
    if text.contains(',') || text.contains('"') || text.contains('\n') {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// Run metadata stamped onto saved result records.
#[derive(Debug, Serialize)]
struct Metadata {
    timestamp: String,
    version: &'static str,
    algorithm: &'static str,
}

#[derive(Debug, Serialize)]
struct ResultRecord<'a> {
    metadata: Metadata,
    answer: &'a str,
    steps: usize,
    chain: &'a Chain,
    tables: &'a [Table],
    final_table: &'a Table,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'a str>,
}

/// Write a reasoning outcome to `path` as a JSON result record.
pub fn save_results(outcome: &ReasonOutcome, path: &Path) -> Result<()> {
    let record = ResultRecord {
        metadata: Metadata {
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
            algorithm: "chain-of-table",
        },
        answer: &outcome.answer,
        steps: outcome.steps,
        chain: &outcome.chain,
        tables: &outcome.tables,
        final_table: &outcome.final_table,
        warning: outcome.warning.as_deref(),
    };
    let mut payload = serde_json::to_string_pretty(&record).context("serialize results")?;
    payload.push('\n');
    write_with_parents(path, &payload)
}

fn write_with_parents(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedOracle, cyclists};

    #[test]
    fn json_round_trips_through_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("table.json");
        save_table(&cyclists(), &path).expect("save");
        let loaded = load_table(&path).expect("load");
        assert_eq!(loaded, cyclists());
    }

    #[test]
    fn csv_load_coerces_numbers() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("table.csv");
        fs::write(&path, "Rank,Time,Cyclist\n1,2.5,Alej.\n2,n/a,Davide\n").expect("write");

        let table = load_table(&path).expect("load");
        assert_eq!(table.schema(), vec!["Rank", "Time", "Cyclist"]);
        assert_eq!(table.rows()[0].get("Rank"), Some(&Value::Int(1)));
        assert_eq!(table.rows()[0].get("Time"), Some(&Value::Float(2.5)));
        assert_eq!(table.rows()[1].get("Time"), Some(&Value::text("n/a")));
    }

    #[test]
    fn csv_quoted_fields_keep_commas_and_quotes() {
        let records =
            csv_records("Name\n\"a,b\"\n\"say \"\"hi\"\"\"\n").expect("records");
        assert_eq!(records[1], vec!["a,b".to_string()]);
        assert_eq!(records[2], vec!["say \"hi\"".to_string()]);
    }

    #[test]
    fn csv_round_trips_through_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("table.csv");
        save_table(&cyclists(), &path).expect("save");
        let loaded = load_table(&path).expect("load");
        assert_eq!(loaded, cyclists());
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("table.parquet");
        fs::write(&path, "x").expect("write");
        let err = load_table(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported table format"));
    }

    #[test]
    fn save_results_writes_record_with_metadata() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out").join("results.json");

        let reasoner = crate::reason::Reasoner::new(
            ScriptedOracle::new([
                "OPERATION: f_group_by",
                "ARGUMENTS: Cyclist",
                "OPERATION: [E]",
                "ANSWER: fine",
            ]),
            10,
        );
        let outcome = reasoner.reason(&cyclists(), "Who?").expect("reason");
        save_results(&outcome, &path).expect("save");

        let raw = fs::read_to_string(&path).expect("read");
        let record: serde_json::Value = serde_json::from_str(&raw).expect("parse");
        assert_eq!(record["answer"], "fine");
        assert_eq!(record["steps"], 1);
        assert_eq!(record["metadata"]["algorithm"], "chain-of-table");
        assert_eq!(record["chain"][0], "[B]");
        assert!(record["tables"].is_array());
    }
}
