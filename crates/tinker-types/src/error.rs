use thiserror::Error;

use crate::llm::LlmError;

/// Errors from repository operations (used by trait definitions in tinker-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),
}

/// Errors surfaced by one conversation turn.
///
/// Malformed provider output is not an error: the reply interpreter
/// degrades it to a text turn instead.
#[derive(Debug, Error)]
pub enum TurnError {
    /// Malformed client input. User-correctable; never retried.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The message log could not be read or written. Retryable by the caller.
    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    /// The upstream completion call failed or timed out. Retryable by the caller.
    #[error("provider error: {0}")]
    Provider(#[from] LlmError),
}

impl TurnError {
    /// Whether resending the same turn may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TurnError::Validation(_))
    }
}
