//! Construction-time configuration errors.
//!
//! Runtime operation (`enqueue`/`dequeue`/`peek`) never returns a
//! `Result` — per spec, malformed packets and AQM drops are handled
//! silently (boolean/`Option` return), and backlog-bookkeeping
//! invariant violations are `debug_assert!`s, not recoverable errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("quantum must be greater than zero")]
    ZeroQuantum,
    #[error("perturb_interval must be greater than zero")]
    ZeroPerturbInterval,
    #[error("unknown scheduler discipline: {0}")]
    UnknownDiscipline(String),
}
