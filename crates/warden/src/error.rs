//! Error types for the authorization engine.

use thiserror::Error;
use warden_core::{AccessKind, EntityId, EntityType};
use warden_perms::PermsError;
use warden_store::StoreError;

/// Errors that can occur during authorization decisions.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Resolving or compiling permissions failed.
    #[error("permission error: {0}")]
    Permission(#[from] PermsError),

    /// Counting rows failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The principal may not perform `kind` on the given rows.
    #[error("{kind} access denied on {entity}{}", format_ids(.ids))]
    AuthorizationDenied {
        kind: AccessKind,
        entity: EntityType,
        ids: Vec<EntityId>,
    },
}

fn format_ids(ids: &[EntityId]) -> String {
    if ids.is_empty() {
        return String::new();
    }
    let list: Vec<String> = ids.iter().map(ToString::to_string).collect();
    format!(" (ids: {})", list.join(", "))
}

impl EngineError {
    /// Whether this is a denial rather than a failure.
    pub fn is_denied(&self) -> bool {
        matches!(self, EngineError::AuthorizationDenied { .. })
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_message() {
        let err = EngineError::AuthorizationDenied {
            kind: AccessKind::Remove,
            entity: EntityType::new("com.acme.Invoice"),
            ids: vec![EntityId(1), EntityId(2)],
        };
        assert!(err.is_denied());
        assert_eq!(
            err.to_string(),
            "remove access denied on com.acme.Invoice (ids: 1, 2)"
        );

        let err = EngineError::AuthorizationDenied {
            kind: AccessKind::Read,
            entity: EntityType::new("com.acme.Invoice"),
            ids: vec![],
        };
        assert_eq!(err.to_string(), "read access denied on com.acme.Invoice");
    }
}
