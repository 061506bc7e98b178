//! Test-only helpers: scripted oracles and sample tables.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::core::table::{Row, Table, Value};
use crate::io::oracle::Oracle;

/// Oracle that replays a fixed list of replies in order.
///
/// Running out of replies is an error, so tests notice when the loop asks
/// more often than the scenario scripted.
pub struct ScriptedOracle {
    replies: RefCell<VecDeque<String>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: RefCell::new(replies.into_iter().map(Into::into).collect()),
        }
    }

    /// Replies not yet consumed by the run under test.
    pub fn remaining(&self) -> usize {
        self.replies.borrow().len()
    }
}

impl Oracle for ScriptedOracle {
    fn ask(&self, _prompt: &str) -> Result<String> {
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted oracle ran out of replies"))
    }
}

/// Oracle whose every call fails, for transport-failure paths.
pub struct FailingOracle;

impl Oracle for FailingOracle {
    fn ask(&self, _prompt: &str) -> Result<String> {
        Err(anyhow!("oracle offline"))
    }
}

/// Build a row from (column, value) pairs.
pub fn row(cells: &[(&str, Value)]) -> Row {
    let mut row = Row::new();
    for (name, value) in cells {
        row.set(*name, value.clone());
    }
    row
}

/// Three-row cyclists sample mirroring the demo data.
pub fn cyclists() -> Table {
    Table::from_rows(vec![
        row(&[("Rank", Value::Int(1)), ("Cyclist", Value::text("Alej. (ESP)"))]),
        row(&[("Rank", Value::Int(2)), ("Cyclist", Value::text("Davide (ITA)"))]),
        row(&[("Rank", Value::Int(3)), ("Cyclist", Value::text("Paolo (ITA)"))]),
    ])
}
