//! The atomic table transforms and their dispatcher.
//!
//! Each transform is a pure, total function from a well-formed table to a new
//! table; none mutate their input. Preconditions that are *logical* errors
//! (such as adding a column that already exists) are not checked here; the
//! reasoning loop guards against them before applying.

use std::cmp::Ordering;
use std::fmt;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::core::table::{Row, Table, Value};

/// The closed set of operations the planner may choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AddColumn,
    SelectRow,
    SelectColumn,
    GroupBy,
    SortBy,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::AddColumn,
        Operation::SelectRow,
        Operation::SelectColumn,
        Operation::GroupBy,
        Operation::SortBy,
    ];

    /// Wire token used in prompts, chains, and exclusion sets.
    pub fn token(self) -> &'static str {
        match self {
            Operation::AddColumn => "f_add_column",
            Operation::SelectRow => "f_select_row",
            Operation::SelectColumn => "f_select_column",
            Operation::GroupBy => "f_group_by",
            Operation::SortBy => "f_sort_by",
        }
    }

    pub fn from_token(token: &str) -> Option<Operation> {
        Operation::ALL.into_iter().find(|op| op.token() == token)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Typed arguments for one operation, produced by the argument parser and
/// consumed by [`apply`].
///
/// Serializes to the loose wire shapes recorded in result files:
/// `["Country", ["ESP", "ITA"]]`, `[1, 2, 3]`, `["Name", "Country"]`,
/// `"Country"`, `["Count", false]`.
#[derive(Debug, Clone, PartialEq)]
pub enum OpArgs {
    AddColumn {
        name: String,
        values: Option<Vec<Value>>,
        default: Value,
    },
    SelectRow(Vec<i64>),
    SelectColumn(Vec<String>),
    GroupBy {
        name: String,
        count_column: String,
    },
    SortBy {
        name: String,
        ascending: bool,
    },
    /// Payload for an operation token outside the known algebra. Applying it
    /// leaves the table unchanged.
    Raw(String),
}

impl Serialize for OpArgs {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            OpArgs::AddColumn {
                name,
                values,
                default,
            } => {
                let mut seq = serializer.serialize_seq(None)?;
                seq.serialize_element(name)?;
                if let Some(values) = values {
                    seq.serialize_element(values)?;
                    if *default != Value::text("") {
                        seq.serialize_element(default)?;
                    }
                }
                seq.end()
            }
            OpArgs::SelectRow(indices) => indices.serialize(serializer),
            OpArgs::SelectColumn(names) => names.serialize(serializer),
            OpArgs::GroupBy { name, count_column } => {
                if count_column == "Count" {
                    serializer.serialize_str(name)
                } else {
                    let mut seq = serializer.serialize_seq(Some(2))?;
                    seq.serialize_element(name)?;
                    seq.serialize_element(count_column)?;
                    seq.end()
                }
            }
            OpArgs::SortBy { name, ascending } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(name)?;
                seq.serialize_element(ascending)?;
                seq.end()
            }
            OpArgs::Raw(payload) => serializer.serialize_str(payload),
        }
    }
}

impl fmt::Display for OpArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(text) => f.write_str(&text),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Append a column to every row.
///
/// Row `i` gets `values[i]` when in range, else `default`; omitting `values`
/// fills every row with `default`. An existing column of the same name is
/// silently overwritten; callers guard against duplicates beforehand.
pub fn add_column(table: &Table, name: &str, values: Option<&[Value]>, default: &Value) -> Table {
    let rows = table
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let value = values
                .and_then(|values| values.get(i))
                .cloned()
                .unwrap_or_else(|| default.clone());
            let mut row = row.clone();
            row.set(name, value);
            row
        })
        .collect();
    Table::from_rows(rows)
}

/// Select rows by 1-based index.
///
/// Non-positive and out-of-range indices are silently dropped. The output
/// follows the index list as given, not the table's natural order, and may
/// repeat rows when an index repeats.
pub fn select_row(table: &Table, indices: &[i64]) -> Table {
    let len = table.len() as i64;
    let rows = indices
        .iter()
        .filter(|&&index| index > 0 && index <= len)
        .map(|&index| table.rows()[(index - 1) as usize].clone())
        .collect();
    Table::from_rows(rows)
}

/// Project each row onto exactly the requested columns, in the requested
/// order. Missing columns resolve to empty text rather than erroring.
pub fn select_column(table: &Table, names: &[String]) -> Table {
    let rows = table
        .rows()
        .iter()
        .map(|row| {
            let mut projected = Row::new();
            for name in names {
                projected.set(name.clone(), row.get_or_empty(name));
            }
            projected
        })
        .collect();
    Table::from_rows(rows)
}

/// Group rows by the distinct values of `name`.
///
/// The result holds one row per distinct value (type-sensitive equality) in
/// first-seen order, carrying the value and its occurrence count; all other
/// columns are discarded.
pub fn group_by(table: &Table, name: &str, count_column: &str) -> Table {
    let mut groups: Vec<(Value, i64)> = Vec::new();
    for row in table.rows() {
        let value = row.get_or_empty(name);
        match groups.iter_mut().find(|(seen, _)| *seen == value) {
            Some(group) => group.1 += 1,
            None => groups.push((value, 1)),
        }
    }

    let rows = groups
        .into_iter()
        .map(|(value, count)| {
            let mut row = Row::new();
            row.set(name, value);
            row.set(count_column, Value::Int(count));
            row
        })
        .collect();
    Table::from_rows(rows)
}

/// Sort rows by column `name`, stable.
///
/// Cells that parse numerically compare as numbers and order before cells
/// that do not; the rest compare as text. A missing column sorts as empty
/// text. Ties keep their original relative order in both directions.
pub fn sort_by(table: &Table, name: &str, ascending: bool) -> Table {
    let mut rows = table.rows().to_vec();
    rows.sort_by(|a, b| {
        let ordering = compare_cells(&a.get_or_empty(name), &b.get_or_empty(name));
        if ascending {
            ordering
        } else {
            ordering.reverse()
        }
    });
    Table::from_rows(rows)
}

fn compare_cells(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.to_string().cmp(&b.to_string()),
    }
}

/// Apply typed arguments to a table, dispatching on the argument variant.
///
/// [`OpArgs::Raw`] (an operation the algebra does not know) passes the table
/// through unchanged rather than failing; callers that want to reject unknown
/// operations must do so before applying.
pub fn apply(table: &Table, args: &OpArgs) -> Table {
    match args {
        OpArgs::AddColumn {
            name,
            values,
            default,
        } => add_column(table, name, values.as_deref(), default),
        OpArgs::SelectRow(indices) => select_row(table, indices),
        OpArgs::SelectColumn(names) => select_column(table, names),
        OpArgs::GroupBy { name, count_column } => group_by(table, name, count_column),
        OpArgs::SortBy { name, ascending } => sort_by(table, name, *ascending),
        OpArgs::Raw(_) => table.clone(),
    }
}
