//! Strong type definitions for Warden.
//!
//! Identifiers and entity names are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a stored record.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl EntityId {
    /// Get the raw value.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A fully-qualified, dotted entity-type name such as `com.acme.Invoice`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    /// Create an entity type from its fully-qualified name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The fully-qualified name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// The package part of the name (`com.acme` for `com.acme.Invoice`).
    pub fn package(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(pkg, _)| pkg)
    }

    /// The package wildcard pattern (`com.acme.*`), if the name has a package.
    pub fn package_wildcard(&self) -> Option<String> {
        self.package().map(|pkg| format!("{pkg}.*"))
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityType({})", self.0)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EntityType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_wildcard() {
        let ty = EntityType::new("com.acme.Invoice");
        assert_eq!(ty.package(), Some("com.acme"));
        assert_eq!(ty.package_wildcard().as_deref(), Some("com.acme.*"));
    }

    #[test]
    fn test_unqualified_has_no_wildcard() {
        let ty = EntityType::new("Invoice");
        assert_eq!(ty.package(), None);
        assert_eq!(ty.package_wildcard(), None);
    }

    #[test]
    fn test_entity_id_display() {
        assert_eq!(EntityId(42).to_string(), "42");
        assert_eq!(format!("{:?}", EntityId(7)), "EntityId(7)");
    }
}
