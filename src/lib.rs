//! Oracle-guided chain-of-table reasoning engine.
//!
//! Answers a natural-language question about a tabular dataset by
//! iteratively transforming the table through a fixed algebra of five
//! operations, with an external language model choosing each step. The
//! architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (table algebra, argument
//!   parsing, conflict guards). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (oracle HTTP backends, prompt
//!   templates, table files). Isolated to enable scripted stand-ins in tests.
//!
//! Orchestration modules ([`reason`], [`select`]) coordinate core logic with
//! the oracle to drive the reasoning loop.

pub mod core;
pub mod io;
pub mod logging;
pub mod reason;
pub mod select;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
