//! Table data model: ordered rows of flat scalar values.
//!
//! A [`Table`] is an ordered sequence of [`Row`]s that all share one schema
//! (the ordered column set of the first row). Rows serialize as flat JSON
//! objects with key order preserved, so loaded files round-trip in column
//! order. Every transform in the algebra produces a new `Table`; values are
//! never mutated through shared references.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A scalar cell value: text, integer, or real number.
///
/// Equality is type-sensitive: `Int(1)`, `Float(1.0)` and `Text("1")` are
/// three distinct values for grouping purposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Build a text value.
    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    /// Numeric view of the value, parsing text opportunistically.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::text(text)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

/// One table row: an insertion-ordered mapping from column name to value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    entries: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column. An existing column is overwritten in place, keeping its
    /// position; a new column is appended to the end of the row.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(key, _)| *key == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Value for `name`, or empty text when the column is missing.
    pub fn get_or_empty(&self, name: &str) -> Value {
        self.get(name).cloned().unwrap_or_else(|| Value::text(""))
    }

    /// Column names in row order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = Row;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a flat map of column names to scalar values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Row, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut row = Row::new();
                while let Some((name, value)) = access.next_entry::<String, Value>()? {
                    row.set(name, value);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// An ordered sequence of uniform-schema rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    /// The empty table, which is valid and has an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in order, taken from the first row.
    pub fn schema(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.columns().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.rows
            .first()
            .is_some_and(|row| row.columns().any(|column| column == name))
    }

    /// Format problems, empty when the table is well-formed.
    ///
    /// Well-formed means every row carries the same column set as the first
    /// row (order-insensitive, matching how the rows were authored).
    pub fn format_violations(&self) -> Vec<String> {
        let Some(first) = self.rows.first() else {
            return Vec::new();
        };
        let mut schema: Vec<&str> = first.columns().collect();
        schema.sort_unstable();

        let mut violations = Vec::new();
        for (index, row) in self.rows.iter().enumerate().skip(1) {
            let mut columns: Vec<&str> = row.columns().collect();
            columns.sort_unstable();
            if columns != schema {
                violations.push(format!(
                    "row {} has columns {:?} but the schema is {:?}",
                    index + 1,
                    columns,
                    schema
                ));
            }
        }
        violations
    }

    pub fn is_well_formed(&self) -> bool {
        self.format_violations().is_empty()
    }

    /// Render the table in pipe format for prompts and console output.
    pub fn render_pipe(&self) -> String {
        if self.rows.is_empty() {
            return "Empty table".to_string();
        }
        let columns = self.schema();
        let header = columns.join(" | ");
        let separator = "-".repeat(header.chars().count());

        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(header);
        lines.push(separator);
        for row in &self.rows {
            let cells: Vec<String> = columns
                .iter()
                .map(|column| row.get_or_empty(column).to_string())
                .collect();
            lines.push(cells.join(" | "));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Row {
        let mut row = Row::new();
        row.set("Rank", Value::Int(1));
        row.set("Cyclist", Value::text("Alej. (ESP)"));
        row
    }

    #[test]
    fn schema_follows_first_row_order() {
        let table = Table::from_rows(vec![sample_row()]);
        assert_eq!(table.schema(), vec!["Rank", "Cyclist"]);
        assert!(table.has_column("Rank"));
        assert!(!table.has_column("Country"));
    }

    #[test]
    fn set_overwrites_in_place() {
        let mut row = sample_row();
        row.set("Rank", Value::Int(7));
        assert_eq!(row.get("Rank"), Some(&Value::Int(7)));
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["Rank", "Cyclist"]);
    }

    #[test]
    fn get_or_empty_defaults_to_empty_text() {
        let row = sample_row();
        assert_eq!(row.get_or_empty("Country"), Value::text(""));
    }

    #[test]
    fn empty_table_is_well_formed() {
        assert!(Table::new().is_well_formed());
        assert!(Table::new().schema().is_empty());
    }

    #[test]
    fn format_violations_flag_non_uniform_rows() {
        let mut other = Row::new();
        other.set("Rank", Value::Int(2));
        let table = Table::from_rows(vec![sample_row(), other]);

        let violations = table.format_violations();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("row 2"));
        assert!(!table.is_well_formed());
    }

    /// Column order is part of the on-disk contract; deserializing must keep
    /// the object key order of the source document.
    #[test]
    fn json_round_trip_preserves_column_order() {
        let raw = r#"[{"Rank":1,"Cyclist":"Alej. (ESP)","Time":"2:45:30"}]"#;
        let table: Table = serde_json::from_str(raw).expect("parse");
        assert_eq!(table.schema(), vec!["Rank", "Cyclist", "Time"]);

        let encoded = serde_json::to_string(&table).expect("serialize");
        assert_eq!(encoded, raw);
    }

    #[test]
    fn untagged_values_parse_by_type() {
        let table: Table =
            serde_json::from_str(r#"[{"a": 1, "b": 1.5, "c": "x"}]"#).expect("parse");
        let row = &table.rows()[0];
        assert_eq!(row.get("a"), Some(&Value::Int(1)));
        assert_eq!(row.get("b"), Some(&Value::Float(1.5)));
        assert_eq!(row.get("c"), Some(&Value::text("x")));
    }

    #[test]
    fn values_are_type_sensitive() {
        assert_ne!(Value::Int(1), Value::text("1"));
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::text("1").as_f64(), Some(1.0));
        assert_eq!(Value::text("n/a").as_f64(), None);
    }

    #[test]
    fn render_pipe_lists_rows_under_header() {
        let table = Table::from_rows(vec![sample_row()]);
        let rendered = table.render_pipe();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Rank | Cyclist");
        assert!(lines[1].chars().all(|c| c == '-'));
        assert_eq!(lines[2], "1 | Alej. (ESP)");

        assert_eq!(Table::new().render_pipe(), "Empty table");
    }
}
