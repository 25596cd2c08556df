//! Error types for Passage

/// Main error type for engine operations
#[derive(Debug, thiserror::Error)]
pub enum PassageError {
    /// The underlying document store failed to read or write.
    ///
    /// Always surfaced to the caller. A store failure must never be read as
    /// "unauthorized" or "no progress" — both of those are `Ok` states that
    /// the engine derives from an absent record, not from a failed read.
    #[error("Store error: {0}")]
    Store(String),

    /// The roster service failed. Fatal to a reconciliation call.
    #[error("Roster error: {0}")]
    Roster(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for PassageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {}", err))
    }
}

/// Result type alias using PassageError
pub type Result<T> = std::result::Result<T, PassageError>;
