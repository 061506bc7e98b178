//! Typed error kinds for the reasoning core.

use thiserror::Error;

/// Errors produced by the reasoning core.
///
/// Only [`Error::InvalidTable`] ever escapes a reasoning run; the other kinds
/// are recovered inside the loop (forced termination plus a best-effort
/// answer) and surface as a warning on the outcome.
#[derive(Debug, Error)]
pub enum Error {
    /// The input table is not a uniform list of flat scalar rows.
    #[error("invalid table: {0}")]
    InvalidTable(String),

    /// The argument parser could not find a usable payload, or the payload
    /// was incomplete for the operation.
    #[error("missing arguments for {operation}: {detail}")]
    MissingArguments { operation: String, detail: String },

    /// A payload was extracted but did not decode to the operation's shape.
    #[error("failed to parse {operation} arguments from {payload:?}: {reason}")]
    ParseFailure {
        operation: String,
        payload: String,
        reason: String,
    },

    /// The oracle collaborator failed outright.
    #[error("oracle request failed: {0}")]
    Oracle(String),
}
