//! Oracle-backed selection of the next operation.

use anyhow::Result;
use tracing::debug;

use crate::core::chain::{Chain, END_TOKEN};
use crate::core::ops::Operation;
use crate::core::table::Table;
use crate::io::oracle::Oracle;
use crate::io::prompt;

/// Ask the oracle for the next operation token.
///
/// The prompt enumerates only the operations still eligible for this step
/// (the five-token set minus `excluded`). When nothing is eligible the end
/// token is returned without an oracle round-trip, which bounds the per-step
/// retry sub-loop. The returned token is not validated here; unrecognized
/// tokens flow back to the reasoning loop as-is.
pub fn select_operation<O: Oracle>(
    oracle: &O,
    table: &Table,
    question: &str,
    chain: &Chain,
    max_steps: usize,
    excluded: &[String],
) -> Result<String> {
    let candidates: Vec<&str> = Operation::ALL
        .iter()
        .map(|op| op.token())
        .filter(|token| !excluded.iter().any(|skip| skip == token))
        .collect();
    if candidates.is_empty() {
        debug!("all operations excluded; forcing end token");
        return Ok(END_TOKEN.to_string());
    }

    let prompt = prompt::render_plan(
        table,
        question,
        chain,
        max_steps,
        &candidates,
        !excluded.is_empty(),
    )?;
    let reply = oracle.ask(&prompt)?;
    Ok(parse_operation_reply(&reply))
}

/// Extract a single operation token from an oracle reply.
///
/// Prefers an `OPERATION:`-marked line, falls back to the last non-empty
/// line; trailing list separators and parenthesized argument lists are
/// trimmed off.
fn parse_operation_reply(reply: &str) -> String {
    for line in reply.lines() {
        if let Some((_, rest)) = line.split_once("OPERATION:") {
            let rest = rest.trim();
            if !rest.is_empty() {
                return clean_token(rest);
            }
        }
    }
    clean_token(reply.trim().lines().last().unwrap_or(""))
}

fn clean_token(token: &str) -> String {
    let token = token.split(',').next().unwrap_or("");
    let token = token.split('(').next().unwrap_or("");
    token.trim().to_string()
}
