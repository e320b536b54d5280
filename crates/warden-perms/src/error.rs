//! Error types for the permissions module.

use thiserror::Error;
use warden_core::ScriptError;
use warden_store::StoreError;

/// Errors that can occur while resolving and compiling permissions.
#[derive(Debug, Error)]
pub enum PermsError {
    /// The resolver registry was misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A condition or one of its parameters failed to evaluate.
    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    /// The permission store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
