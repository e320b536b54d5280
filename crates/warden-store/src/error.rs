//! Error types for the store module.

use thiserror::Error;
use warden_core::ScriptError;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Row serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A predicate condition failed to evaluate.
    #[error("condition error: {0}")]
    Script(#[from] ScriptError),

    /// The predicate cannot be expressed by this backend.
    #[error("unsupported predicate: {0}")]
    UnsupportedPredicate(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding the backend was poisoned.
    #[error("store lock poisoned: {0}")]
    Lock(String),

    /// A blocking task failed to complete.
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
