//! Error types crossing the acquisition core's boundary
//!
//! Only three failures ever reach a caller: the call budget ran out, the
//! upstream API answered with an error, or no response arrived at all.
//! Cache corruption and storage quota problems are absorbed inside the
//! cache layer and never appear here.

use thiserror::Error;

/// Failures surfaced by `Orchestrator::acquire` and its wrappers
///
/// `Clone` so that coalesced callers waiting on the same in-flight fetch
/// can each receive the shared outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AcquireError {
    /// The rate limiter refused the call; recoverable by waiting
    #[error("Rate limit exceeded. Please wait a moment.")]
    BudgetExhausted,

    /// The API returned a non-success response; message surfaced verbatim
    #[error("{0}")]
    Upstream(String),

    /// No response reached the client (offline, DNS failure, timeout)
    #[error("Network error. Please check your connection.")]
    Transport(String),
}

impl AcquireError {
    /// Detail string for logging; for transport errors this carries the
    /// underlying cause that the user-facing message deliberately hides
    pub fn detail(&self) -> &str {
        match self {
            AcquireError::BudgetExhausted => "call budget exhausted",
            AcquireError::Upstream(msg) => msg,
            AcquireError::Transport(detail) => detail,
        }
    }
}
