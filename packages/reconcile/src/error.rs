//! Typed errors for the reconciliation library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors that can occur during a reconciliation run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Interpretation capability failed
    #[error("interpretation error: {0}")]
    Interpret(#[from] InterpretError),

    /// A record failed validation when it was constructed
    #[error("invalid record: {reason}")]
    InvalidRecord { reason: String },

    /// Checkpoint storage failed
    #[error("checkpoint storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {reason}")]
    Config { reason: String },

    /// Run was cancelled between clusters
    #[error("run cancelled after cluster {last_completed:?}")]
    Cancelled { last_completed: Option<u32> },
}

impl ReconcileError {
    /// Build an `InvalidRecord` error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            reason: reason.into(),
        }
    }

    /// Wrap a storage backend error.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }
}

/// Errors raised by an interpretation capability.
///
/// The run never propagates these; a cluster whose interpretation fails
/// contributes zero candidates.
#[derive(Debug, Error)]
pub enum InterpretError {
    /// The call did not complete in time
    #[error("interpretation timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// The underlying service failed
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The service answered but the answer did not conform
    #[error("malformed response: {reason}")]
    Malformed { reason: String },
}

impl InterpretError {
    /// Build a `Malformed` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Result type alias for interpretation calls.
pub type InterpretResult<T> = std::result::Result<T, InterpretError>;
