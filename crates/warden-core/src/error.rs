//! Error types for Warden Core.

use thiserror::Error;

/// Errors raised while parsing or evaluating an expression.
///
/// Scripting errors are never turned into a grant or a deny: they propagate
/// to the caller of the decision API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("syntax error in `{expr}`: {message}")]
    Syntax { expr: String, message: String },

    #[error("unknown binding `{0}`")]
    UnknownBinding(String),

    #[error("missing positional parameter ?{0}")]
    MissingParam(usize),

    #[error("type error: {0}")]
    Type(String),
}

impl ScriptError {
    pub(crate) fn syntax(expr: &str, message: impl Into<String>) -> Self {
        ScriptError::Syntax {
            expr: expr.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, ScriptError>;
