//! Proposal validation guards for the conflict/retry sub-loop.
//!
//! A proposed (operation, arguments) pair is checked against the current
//! table and chain before it is applied. A conflict is not an error: the
//! reasoning loop excludes the operation for the rest of the step and asks
//! the oracle again.

use std::fmt;

use crate::core::chain::Chain;
use crate::core::ops::{OpArgs, Operation};
use crate::core::table::Table;

/// Question words that mark a superlative counting question.
const SUPERLATIVE_CUES: [&str; 4] = ["most", "highest", "lowest", "least"];

/// Why a proposed operation was rejected for this step.
#[derive(Debug, Clone, PartialEq)]
pub enum Conflict {
    /// AddColumn proposed a column that already exists.
    DuplicateColumn { column: String, schema: Vec<String> },
    /// The exact (operation, arguments) pair was already applied.
    RepeatedAction { operation: String },
    /// The table already answers a superlative counting question; only a
    /// sort (or the end signal) is useful now.
    AlreadyAnswerable { operation: String },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::DuplicateColumn { column, schema } => {
                write!(f, "column '{column}' already exists in {schema:?}")
            }
            Conflict::RepeatedAction { operation } => {
                write!(f, "{operation} was already performed with the same arguments")
            }
            Conflict::AlreadyAnswerable { operation } => {
                write!(
                    f,
                    "the answer is already available in the current table; {operation} is redundant"
                )
            }
        }
    }
}

/// Check a proposal against the current table and chain.
///
/// Returns the first conflict in guard order, or `None` when the proposal
/// may be applied. The already-answerable guard is a heuristic keyed on a
/// literal `Count` column and superlative question words; it steers the
/// chain toward sorting when a count table is ready, it is not a
/// correctness check.
pub fn check_proposal(
    table: &Table,
    chain: &Chain,
    question: &str,
    operation: &str,
    args: &OpArgs,
) -> Option<Conflict> {
    if operation == Operation::AddColumn.token() && !table.is_empty() {
        if let OpArgs::AddColumn { name, .. } = args {
            if table.has_column(name) {
                return Some(Conflict::DuplicateColumn {
                    column: name.clone(),
                    schema: table.schema(),
                });
            }
        }
    }

    if chain.contains_applied(operation, args) {
        return Some(Conflict::RepeatedAction {
            operation: operation.to_string(),
        });
    }

    if !table.is_empty()
        && table.has_column("Count")
        && operation != Operation::SortBy.token()
        && question_has_superlative(question)
        && distinct_count_values(table) > 1
    {
        return Some(Conflict::AlreadyAnswerable {
            operation: operation.to_string(),
        });
    }

    None
}

fn question_has_superlative(question: &str) -> bool {
    let question = question.to_lowercase();
    SUPERLATIVE_CUES.iter().any(|cue| question.contains(cue))
}

fn distinct_count_values(table: &Table) -> usize {
    let mut distinct: Vec<&crate::core::table::Value> = Vec::new();
    for row in table.rows() {
        if let Some(value) = row.get("Count") {
            if !distinct.iter().any(|seen| *seen == value) {
                distinct.push(value);
            }
        }
    }
    distinct.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::Value;
    use crate::test_support::{cyclists, row};

    fn count_table(counts: &[i64]) -> Table {
        Table::from_rows(
            counts
                .iter()
                .enumerate()
                .map(|(i, &count)| {
                    row(&[
                        ("Country", Value::text(format!("C{i}"))),
                        ("Count", Value::Int(count)),
                    ])
                })
                .collect(),
        )
    }

    fn add_country_args() -> OpArgs {
        OpArgs::AddColumn {
            name: "Country".to_string(),
            values: Some(vec![Value::text("ESP")]),
            default: Value::text(""),
        }
    }

    #[test]
    fn duplicate_column_is_rejected() {
        let table = crate::core::ops::add_column(
            &cyclists(),
            "Country",
            Some(&[Value::text("ESP")]),
            &Value::text(""),
        );
        let conflict = check_proposal(
            &table,
            &Chain::start(),
            "who?",
            "f_add_column",
            &add_country_args(),
        );
        assert!(matches!(
            conflict,
            Some(Conflict::DuplicateColumn { column, .. }) if column == "Country"
        ));
    }

    #[test]
    fn fresh_column_passes_the_duplicate_guard() {
        let conflict = check_proposal(
            &cyclists(),
            &Chain::start(),
            "who?",
            "f_add_column",
            &add_country_args(),
        );
        assert_eq!(conflict, None);
    }

    #[test]
    fn repeated_action_is_rejected() {
        let args = OpArgs::SelectRow(vec![1, 2]);
        let mut chain = Chain::start();
        chain.push(crate::core::chain::Step::Applied {
            operation: "f_select_row".to_string(),
            arguments: args.clone(),
        });

        let conflict = check_proposal(&cyclists(), &chain, "who?", "f_select_row", &args);
        assert!(matches!(conflict, Some(Conflict::RepeatedAction { .. })));

        let other = OpArgs::SelectRow(vec![3]);
        assert_eq!(
            check_proposal(&cyclists(), &chain, "who?", "f_select_row", &other),
            None
        );
    }

    #[test]
    fn answerable_count_table_rejects_everything_but_sort() {
        let table = count_table(&[1, 2]);
        let question = "Which country had the most cyclists?";

        let conflict = check_proposal(
            &table,
            &Chain::start(),
            question,
            "f_select_row",
            &OpArgs::SelectRow(vec![1]),
        );
        assert!(matches!(conflict, Some(Conflict::AlreadyAnswerable { .. })));

        let sort = check_proposal(
            &table,
            &Chain::start(),
            question,
            "f_sort_by",
            &OpArgs::SortBy {
                name: "Count".to_string(),
                ascending: false,
            },
        );
        assert_eq!(sort, None);
    }

    #[test]
    fn uniform_counts_do_not_trigger_the_answerable_guard() {
        let table = count_table(&[2, 2]);
        let conflict = check_proposal(
            &table,
            &Chain::start(),
            "Which country had the most cyclists?",
            "f_select_row",
            &OpArgs::SelectRow(vec![1]),
        );
        assert_eq!(conflict, None);
    }

    #[test]
    fn non_superlative_questions_skip_the_answerable_guard() {
        let table = count_table(&[1, 2]);
        let conflict = check_proposal(
            &table,
            &Chain::start(),
            "How many countries are listed?",
            "f_select_row",
            &OpArgs::SelectRow(vec![1]),
        );
        assert_eq!(conflict, None);
    }
}
