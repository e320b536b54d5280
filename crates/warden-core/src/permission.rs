//! Permission records, roles and groups.
//!
//! Permissions are read-only to the decision engine: they are authored and
//! stored elsewhere and only looked up here.

use serde::{Deserialize, Serialize};

use crate::access::AccessKind;

/// A stored rule granting a capability set over an entity type or package.
///
/// A permission with a blank `condition` is a blanket grant for every kind
/// whose flag is set. Any non-blank condition makes the grant row-conditional,
/// whatever the flags say.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// Unique name.
    pub name: String,

    /// Fully-qualified entity type, or a package wildcard such as `com.acme.*`.
    pub object: String,

    #[serde(default)]
    pub can_read: bool,
    #[serde(default)]
    pub can_write: bool,
    #[serde(default)]
    pub can_create: bool,
    #[serde(default)]
    pub can_remove: bool,
    #[serde(default)]
    pub can_import: bool,
    #[serde(default)]
    pub can_export: bool,

    /// Row condition in the expression language, with `?N` placeholders.
    #[serde(default)]
    pub condition: Option<String>,

    /// Comma-separated parameter spec bound to the condition's placeholders.
    #[serde(default)]
    pub condition_params: Option<String>,
}

impl Permission {
    /// Create a permission with no capabilities.
    pub fn new(name: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            object: object.into(),
            can_read: false,
            can_write: false,
            can_create: false,
            can_remove: false,
            can_import: false,
            can_export: false,
            condition: None,
            condition_params: None,
        }
    }

    /// Set the flag for one access kind.
    pub fn allow(mut self, kind: AccessKind) -> Self {
        self.set(kind, true);
        self
    }

    /// Set the flags for every access kind.
    pub fn allow_all(mut self) -> Self {
        for kind in AccessKind::ALL {
            self.set(kind, true);
        }
        self
    }

    /// Attach a row condition and its parameter spec.
    pub fn with_condition(
        mut self,
        condition: impl Into<String>,
        params: Option<&str>,
    ) -> Self {
        self.condition = Some(condition.into());
        self.condition_params = params.map(str::to_string);
        self
    }

    /// Set the capability flag for `kind`.
    pub fn set(&mut self, kind: AccessKind, value: bool) {
        match kind {
            AccessKind::Read => self.can_read = value,
            AccessKind::Write => self.can_write = value,
            AccessKind::Create => self.can_create = value,
            AccessKind::Remove => self.can_remove = value,
            AccessKind::Import => self.can_import = value,
            AccessKind::Export => self.can_export = value,
        }
    }

    /// The capability flag for `kind`.
    pub fn grants(&self, kind: AccessKind) -> bool {
        match kind {
            AccessKind::Read => self.can_read,
            AccessKind::Write => self.can_write,
            AccessKind::Create => self.can_create,
            AccessKind::Remove => self.can_remove,
            AccessKind::Import => self.can_import,
            AccessKind::Export => self.can_export,
        }
    }

    /// The condition, if it is not blank.
    pub fn condition(&self) -> Option<&str> {
        self.condition
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Whether this permission is row-conditional.
    pub fn is_conditional(&self) -> bool {
        self.condition().is_some()
    }

    /// Whether this is an unconditional grant for `kind`.
    pub fn is_blanket_for(&self, kind: AccessKind) -> bool {
        !self.is_conditional() && self.grants(kind)
    }

    /// Whether `object` is a package wildcard pattern.
    pub fn is_wildcard(&self) -> bool {
        self.object.ends_with(".*")
    }
}

/// A named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: Vec::new(),
        }
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }
}

/// A group of principals with its own permissions and roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub code: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Group {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            roles: Vec::new(),
            permissions: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_independent() {
        let perm = Permission::new("p", "com.acme.Invoice")
            .allow(AccessKind::Read)
            .allow(AccessKind::Export);

        assert!(perm.grants(AccessKind::Read));
        assert!(perm.grants(AccessKind::Export));
        assert!(!perm.grants(AccessKind::Write));
        assert!(!perm.grants(AccessKind::Remove));
    }

    #[test]
    fn test_blank_condition_is_blanket() {
        let mut perm = Permission::new("p", "com.acme.Invoice").allow(AccessKind::Read);
        assert!(perm.is_blanket_for(AccessKind::Read));

        perm.condition = Some("   ".into());
        assert!(!perm.is_conditional());
        assert!(perm.is_blanket_for(AccessKind::Read));

        let perm = perm.with_condition("self.owner == ?1", Some("__user__"));
        assert!(perm.is_conditional());
        assert!(!perm.is_blanket_for(AccessKind::Read));
    }

    #[test]
    fn test_wildcard() {
        assert!(Permission::new("p", "com.acme.*").is_wildcard());
        assert!(!Permission::new("p", "com.acme.Invoice").is_wildcard());
    }
}
