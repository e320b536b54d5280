//! Ordered, deduplicated permission sets.

use std::collections::HashSet;

use warden_core::{AccessKind, Permission};

/// The permissions applicable to one (principal, entity type, access kind)
/// decision.
///
/// Insertion order is preserved and duplicates are dropped, so predicate
/// composition over the set is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    /// Permissions in insertion order.
    items: Vec<Permission>,

    /// Index for duplicate detection.
    seen: HashSet<Permission>,
}

impl PermissionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `permission` unless an equal one is already present.
    ///
    /// Returns whether it was added.
    pub fn insert(&mut self, permission: Permission) -> bool {
        if self.seen.contains(&permission) {
            return false;
        }
        self.seen.insert(permission.clone());
        self.items.push(permission);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Permissions in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Permission> {
        self.items.iter()
    }

    /// Whether any permission grants `kind` without a row condition.
    pub fn has_blanket_grant(&self, kind: AccessKind) -> bool {
        self.items.iter().any(|p| p.is_blanket_for(kind))
    }

    /// Row-conditional permissions, in insertion order.
    pub fn conditional(&self) -> impl Iterator<Item = &Permission> {
        self.items.iter().filter(|p| p.is_conditional())
    }
}

impl Extend<Permission> for PermissionSet {
    fn extend<I: IntoIterator<Item = Permission>>(&mut self, iter: I) {
        for permission in iter {
            self.insert(permission);
        }
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a PermissionSet {
    type Item = &'a Permission;
    type IntoIter = std::slice::Iter<'a, Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for PermissionSet {
    type Item = Permission;
    type IntoIter = std::vec::IntoIter<Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn perm(name: &str) -> Permission {
        Permission::new(name, "com.acme.Invoice").allow(AccessKind::Read)
    }

    #[test]
    fn test_insert_dedups_and_keeps_order() {
        let mut set = PermissionSet::new();
        assert!(set.insert(perm("b")));
        assert!(set.insert(perm("a")));
        assert!(!set.insert(perm("b")));

        let names: Vec<_> = set.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn test_blanket_and_conditional() {
        let owned = perm("own").with_condition("self.owner == ?1", Some("__user__"));
        let set: PermissionSet = [owned.clone(), perm("all")].into_iter().collect();

        assert!(set.has_blanket_grant(AccessKind::Read));
        assert!(!set.has_blanket_grant(AccessKind::Write));
        assert_eq!(set.conditional().collect::<Vec<_>>(), vec![&owned]);
    }

    #[test]
    fn test_blank_condition_is_blanket() {
        let blank = perm("blank").with_condition("   ", None);
        let set: PermissionSet = [blank].into_iter().collect();
        assert!(set.has_blanket_grant(AccessKind::Read));
        assert_eq!(set.conditional().count(), 0);
    }

    proptest! {
        #[test]
        fn prop_first_occurrence_wins(names in proptest::collection::vec("[a-d]", 0..20)) {
            let set: PermissionSet = names.iter().map(|n| perm(n)).collect();

            let mut expected: Vec<&str> = Vec::new();
            for name in &names {
                if !expected.contains(&name.as_str()) {
                    expected.push(name);
                }
            }
            let actual: Vec<&str> = set.iter().map(|p| p.name.as_str()).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
