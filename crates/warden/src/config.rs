//! Engine configuration.

use serde::{Deserialize, Serialize};
use warden_perms::ResolverRegistry;

/// Configuration for the [`AuthorizationEngine`](crate::AuthorizationEngine).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Login code that marks a principal as administrator.
    pub admin_code: String,
    /// Group code whose members are administrators.
    pub admin_group: String,
    /// Row field the identity restriction applies to.
    pub id_field: String,
    /// Slot for the secondary resolver.
    #[serde(skip)]
    pub resolvers: ResolverRegistry,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin_code: "admin".into(),
            admin_group: "admins".into(),
            id_field: "id".into(),
            resolvers: ResolverRegistry::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_admin_code(mut self, code: impl Into<String>) -> Self {
        self.admin_code = code.into();
        self
    }

    pub fn with_admin_group(mut self, group: impl Into<String>) -> Self {
        self.admin_group = group.into();
        self
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    /// Use `registry` as the secondary resolver slot.
    pub fn with_resolvers(mut self, registry: ResolverRegistry) -> Self {
        self.resolvers = registry;
        self
    }
}
