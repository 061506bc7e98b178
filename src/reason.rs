//! The reasoning loop: oracle-guided chaining of table transforms.
//!
//! One [`Reasoner::reason`] call owns a private [`ReasoningState`] and drives
//! the step machine: select an operation, generate its arguments, validate
//! the proposal against the table and chain, apply, repeat. Conflicts are
//! recovered inside the step by excluding the operation and re-asking the
//! oracle; step-time failures force-terminate the chain but still produce a
//! best-effort answer. Only a malformed input table is an error.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::chain::{Chain, END_TOKEN, Step};
use crate::core::conflict::check_proposal;
use crate::core::error::Error;
use crate::core::ops::{OpArgs, apply};
use crate::core::parse::parse_args;
use crate::core::table::Table;
use crate::io::oracle::Oracle;
use crate::io::prompt;
use crate::select::select_operation;

/// Sentinel answer when the final oracle exchange fails.
pub const ANSWER_FAILED: &str = "Could not generate answer";

/// Structured result of one reasoning run.
#[derive(Debug, Clone, Serialize)]
pub struct ReasonOutcome {
    /// Final answer text from the oracle, or the failure sentinel.
    pub answer: String,
    /// Full chain from start marker to end marker.
    pub chain: Chain,
    /// Table state per chain position: the initial table, then one snapshot
    /// after each applied step.
    pub tables: Vec<Table>,
    /// The table the answer was generated from.
    pub final_table: Table,
    /// Number of applied (non-marker) steps.
    pub steps: usize,
    /// Set when stepping was aborted by a parse or oracle failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ReasonOutcome {
    /// Step-by-step rendering of the chain with each intermediate table.
    pub fn explanation(&self) -> String {
        let mut out = String::new();
        for (index, step) in self.chain.steps().iter().enumerate() {
            match step {
                Step::Start => {
                    out.push_str(&format!("step {index}: start\n"));
                    if let Some(table) = self.tables.first() {
                        out.push_str(&format!("initial table:\n{}\n\n", table.render_pipe()));
                    }
                }
                Step::End => {
                    out.push_str(&format!("step {index}: end of reasoning\n"));
                }
                Step::Applied { .. } => {
                    out.push_str(&format!("step {index}: apply {step}\n"));
                    if let Some(table) = self.tables.get(index) {
                        out.push_str(&format!("resulting table:\n{}\n\n", table.render_pipe()));
                    }
                }
            }
        }
        out
    }
}

/// Per-run state owned by the loop.
struct ReasoningState {
    table: Table,
    chain: Chain,
    tables: Vec<Table>,
}

/// A proposal that survived validation, ready to apply.
struct Proposal {
    token: String,
    args: OpArgs,
}

/// Oracle-guided reasoner with a fixed step budget.
///
/// Holds only the oracle and the budget; all run state is per-call, so a
/// single `Reasoner` may serve concurrent questions when the oracle can.
pub struct Reasoner<O> {
    oracle: O,
    max_steps: usize,
}

impl<O: Oracle> Reasoner<O> {
    pub fn new(oracle: O, max_steps: usize) -> Self {
        Self { oracle, max_steps }
    }

    /// Answer `question` by iteratively transforming `table`.
    ///
    /// Returns [`Error::InvalidTable`] for a malformed input table; every
    /// other failure mode is recovered into the outcome (forced termination
    /// plus a warning, or the answer sentinel).
    #[instrument(skip_all, fields(rows = table.len(), max_steps = self.max_steps))]
    pub fn reason(&self, table: &Table, question: &str) -> Result<ReasonOutcome, Error> {
        let violations = table.format_violations();
        if !violations.is_empty() {
            return Err(Error::InvalidTable(violations.join("; ")));
        }

        let mut state = ReasoningState {
            table: table.clone(),
            chain: Chain::start(),
            tables: vec![table.clone()],
        };

        // An empty table has no schema to act on; skip straight to the answer.
        let warning = if table.is_empty() {
            debug!("empty table; terminating at step 0");
            None
        } else {
            self.run_steps(&mut state, question)
        };

        state.chain.push(Step::End);

        let answer = match self.final_answer(&state.table, question) {
            Ok(answer) => answer,
            Err(err) => {
                warn!(error = %err, "final answer generation failed");
                ANSWER_FAILED.to_string()
            }
        };

        let steps = state.chain.applied_count();
        info!(steps, answer = %answer, "reasoning finished");
        Ok(ReasonOutcome {
            answer,
            chain: state.chain,
            tables: state.tables,
            final_table: state.table,
            steps,
            warning,
        })
    }

    /// Drive up to `max_steps` select/validate/apply iterations.
    ///
    /// Returns a warning message when stepping was aborted by a step-time
    /// failure; the caller still answers from the table as it stands.
    fn run_steps(&self, state: &mut ReasoningState, question: &str) -> Option<String> {
        for step in 0..self.max_steps {
            let proposal = match self.propose(state, question, step) {
                Ok(Some(proposal)) => proposal,
                Ok(None) => {
                    debug!(step, "end of operation chain");
                    return None;
                }
                Err(err) => {
                    warn!(step, error = %err, "step failed; terminating early");
                    return Some(format!("step {} failed: {err}", step + 1));
                }
            };

            state.table = apply(&state.table, &proposal.args);
            debug!(step, operation = %proposal.token, "applied operation");
            state.chain.push(Step::Applied {
                operation: proposal.token,
                arguments: proposal.args,
            });
            state.tables.push(state.table.clone());
        }
        None
    }

    /// One select/validate retry sub-loop.
    ///
    /// `Ok(None)` means the oracle signalled the end of the chain, directly
    /// or by repeating an excluded token. The sub-loop terminates because
    /// every conflict adds one token to the exclusion set: the candidate
    /// list shrinks until selection is forced to return the end token.
    fn propose(
        &self,
        state: &ReasoningState,
        question: &str,
        step: usize,
    ) -> Result<Option<Proposal>, Error> {
        let mut excluded: Vec<String> = Vec::new();
        loop {
            let token = select_operation(
                &self.oracle,
                &state.table,
                question,
                &state.chain,
                self.max_steps,
                &excluded,
            )
            .map_err(|err| Error::Oracle(format!("{err:#}")))?;
            debug!(step, token = %token, "operation selected");

            if token == END_TOKEN || excluded.iter().any(|skip| *skip == token) {
                return Ok(None);
            }

            let args = self.generate_args(&state.table, question, &token)?;
            debug!(step, token = %token, args = %args, "arguments generated");

            match check_proposal(&state.table, &state.chain, question, &token, &args) {
                Some(conflict) => {
                    debug!(step, token = %token, reason = %conflict, "conflict; retrying selection");
                    excluded.push(token);
                }
                None => return Ok(Some(Proposal { token, args })),
            }
        }
    }

    /// Oracle round-trip for operation arguments.
    fn generate_args(
        &self,
        table: &Table,
        question: &str,
        operation: &str,
    ) -> Result<OpArgs, Error> {
        let prompt = prompt::render_args(table, question, operation)
            .map_err(|err| Error::Oracle(format!("{err:#}")))?;
        let reply = self
            .oracle
            .ask(&prompt)
            .map_err(|err| Error::Oracle(format!("{err:#}")))?;
        parse_args(&reply, operation, table.len())
    }

    /// Oracle round-trip for the final answer.
    fn final_answer(&self, table: &Table, question: &str) -> Result<String, Error> {
        let prompt = prompt::render_answer(table, question)
            .map_err(|err| Error::Oracle(format!("{err:#}")))?;
        let reply = self
            .oracle
            .ask(&prompt)
            .map_err(|err| Error::Oracle(format!("{err:#}")))?;
        Ok(parse_answer_reply(&reply))
    }
}

/// Extract the answer line from an oracle reply.
///
/// Prefers an `ANSWER:`-marked line, falls back to the last non-empty line.
fn parse_answer_reply(reply: &str) -> String {
    for line in reply.lines() {
        if let Some((_, rest)) = line.split_once("ANSWER:") {
            let rest = rest.trim();
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
    }
    reply.trim().lines().last().unwrap_or("").trim().to_string()
}
