//! Reasoning chain: the ordered record of applied operations.
//!
//! A chain begins with the start marker, accumulates one entry per applied
//! operation, and ends with exactly one end marker once reasoning terminates.
//! It is append-only; intermediate tables are kept alongside it by the loop,
//! index-aligned per chain position.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::core::ops::OpArgs;

/// Start-of-chain marker token.
pub const START_TOKEN: &str = "[B]";
/// End-of-chain marker token, also the oracle's end signal.
pub const END_TOKEN: &str = "[E]";

/// One entry in a reasoning chain.
///
/// Serializes to the wire forms recorded in result files: `"[B]"`, `"[E]"`,
/// and `{"operation": ..., "arguments": ...}` for applied steps.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Start,
    End,
    Applied { operation: String, arguments: OpArgs },
}

impl Serialize for Step {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Step::Start => serializer.serialize_str(START_TOKEN),
            Step::End => serializer.serialize_str(END_TOKEN),
            Step::Applied {
                operation,
                arguments,
            } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("operation", operation)?;
                map.serialize_entry("arguments", arguments)?;
                map.end()
            }
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Start => write!(f, "{START_TOKEN} (start)"),
            Step::End => write!(f, "{END_TOKEN} (end)"),
            Step::Applied {
                operation,
                arguments,
            } => write!(f, "{operation}({arguments})"),
        }
    }
}

/// Append-only sequence of steps from start marker to end marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Chain {
    steps: Vec<Step>,
}

impl Chain {
    /// A new chain holding only the start marker.
    pub fn start() -> Self {
        Self {
            steps: vec![Step::Start],
        }
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of applied (non-marker) steps.
    pub fn applied_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, Step::Applied { .. }))
            .count()
    }

    /// Whether the same (operation, canonical argument text) pair was already
    /// applied anywhere in the chain.
    pub fn contains_applied(&self, operation: &str, args: &OpArgs) -> bool {
        let key = args.to_string();
        self.steps.iter().any(|step| {
            matches!(
                step,
                Step::Applied {
                    operation: applied,
                    arguments,
                } if applied == operation && arguments.to_string() == key
            )
        })
    }

    /// Human-readable history for prompts.
    pub fn render_history(&self) -> String {
        self.steps
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_step() -> Step {
        Step::Applied {
            operation: "f_group_by".to_string(),
            arguments: OpArgs::GroupBy {
                name: "Country".to_string(),
                count_column: "Count".to_string(),
            },
        }
    }

    #[test]
    fn chain_starts_with_start_marker() {
        let chain = Chain::start();
        assert_eq!(chain.steps(), &[Step::Start]);
        assert_eq!(chain.applied_count(), 0);
    }

    #[test]
    fn applied_count_ignores_markers() {
        let mut chain = Chain::start();
        chain.push(group_step());
        chain.push(Step::End);
        assert_eq!(chain.applied_count(), 1);
    }

    #[test]
    fn contains_applied_matches_operation_and_arguments() {
        let mut chain = Chain::start();
        chain.push(group_step());

        let same = OpArgs::GroupBy {
            name: "Country".to_string(),
            count_column: "Count".to_string(),
        };
        let different = OpArgs::GroupBy {
            name: "Rank".to_string(),
            count_column: "Count".to_string(),
        };
        assert!(chain.contains_applied("f_group_by", &same));
        assert!(!chain.contains_applied("f_group_by", &different));
        assert!(!chain.contains_applied("f_sort_by", &same));
    }

    #[test]
    fn steps_serialize_to_wire_forms() {
        let mut chain = Chain::start();
        chain.push(group_step());
        chain.push(Step::End);

        let encoded = serde_json::to_value(&chain).expect("serialize");
        assert_eq!(
            encoded,
            serde_json::json!([
                "[B]",
                {"operation": "f_group_by", "arguments": "Country"},
                "[E]",
            ])
        );
    }

    #[test]
    fn history_renders_markers_and_steps() {
        let mut chain = Chain::start();
        chain.push(group_step());
        let history = chain.render_history();
        assert!(history.starts_with("[B] (start)"));
        assert!(history.contains("f_group_by"));
    }
}
