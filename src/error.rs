//! Error types for the intent engine

use thiserror::Error;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid owner credential: {0}")]
    InvalidCredential(String),

    #[error("Malformed action from upstream: {0}")]
    MalformedAction(String),

    #[error("Execution network rejected submission: {0}")]
    SubmissionRejected(String),

    #[error("Settlement query failed for handle {handle}: {message}")]
    TrackingQuery { handle: String, message: String },

    #[error("Tracking retry budget exhausted for handle {handle} after {attempts} attempts")]
    TrackingBudgetExhausted { handle: String, attempts: u32 },

    #[error("Chain {chain_id} is not configured")]
    ChainNotFound { chain_id: u64 },

    #[error("Unknown token symbol {symbol} on chain {chain_id}")]
    TokenNotFound { symbol: String, chain_id: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Check if error is retryable.
    ///
    /// Validation errors are never retried. `SubmissionRejected` is safe to
    /// retry only because the submitter guarantees no handle was issued when
    /// it returns this variant; a response carrying a handle is a success.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::SubmissionRejected(_) | EngineError::TrackingQuery { .. }
        )
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
