//! In-memory implementation of the store traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use warden_core::{EntityId, EntityType, Group, Permission, Predicate, Role};

use crate::error::{Result, StoreError};
use crate::traits::{EntityStore, PermissionStore};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Roles indexed by name.
    roles: HashMap<String, Role>,

    /// Groups indexed by code.
    groups: HashMap<String, Group>,

    /// Direct principal permissions, by login code, in insertion order.
    principal_permissions: HashMap<String, Vec<Permission>>,

    /// Rows per entity type, ordered by id.
    entities: HashMap<EntityType, BTreeMap<EntityId, Value>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn principal_permissions(&self, code: &str) -> Result<Vec<Permission>> {
        let inner = self.read()?;
        Ok(inner
            .principal_permissions
            .get(code)
            .cloned()
            .unwrap_or_default())
    }

    async fn role(&self, name: &str) -> Result<Option<Role>> {
        let inner = self.read()?;
        Ok(inner.roles.get(name).cloned())
    }

    async fn group(&self, code: &str) -> Result<Option<Group>> {
        let inner = self.read()?;
        Ok(inner.groups.get(code).cloned())
    }

    async fn upsert_role(&self, role: &Role) -> Result<()> {
        let mut inner = self.write()?;
        inner.roles.insert(role.name.clone(), role.clone());
        Ok(())
    }

    async fn upsert_group(&self, group: &Group) -> Result<()> {
        let mut inner = self.write()?;
        inner.groups.insert(group.code.clone(), group.clone());
        Ok(())
    }

    async fn add_principal_permission(&self, code: &str, permission: &Permission) -> Result<()> {
        let mut inner = self.write()?;
        let perms = inner
            .principal_permissions
            .entry(code.to_string())
            .or_default();

        // Same name replaces in place, keeping the original position
        match perms.iter_mut().find(|p| p.name == permission.name) {
            Some(existing) => *existing = permission.clone(),
            None => perms.push(permission.clone()),
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn insert_entity(
        &self,
        entity_type: &EntityType,
        id: EntityId,
        row: Value,
    ) -> Result<()> {
        let Value::Object(mut fields) = row else {
            return Err(StoreError::InvalidData(format!(
                "row {id} of {entity_type} is not a JSON object"
            )));
        };
        fields.insert("id".into(), Value::from(id.get()));

        let mut inner = self.write()?;
        inner
            .entities
            .entry(entity_type.clone())
            .or_default()
            .insert(id, Value::Object(fields));
        Ok(())
    }

    async fn count(&self, entity_type: &EntityType, predicate: &Predicate) -> Result<u64> {
        let inner = self.read()?;
        let Some(rows) = inner.entities.get(entity_type) else {
            return Ok(0);
        };

        let mut count = 0;
        for row in rows.values() {
            if predicate.matches(row)? {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_core::{AccessKind, CompiledCondition, QueryParam};

    fn invoice() -> EntityType {
        EntityType::new("com.acme.Invoice")
    }

    #[tokio::test]
    async fn test_role_roundtrip() {
        let store = MemoryStore::new();
        let role = Role::new("accountant")
            .with_permission(Permission::new("inv-read", "com.acme.Invoice").allow(AccessKind::Read));

        store.upsert_role(&role).await.unwrap();

        assert_eq!(store.role("accountant").await.unwrap(), Some(role));
        assert_eq!(store.role("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_principal_permissions_keep_order() {
        let store = MemoryStore::new();
        let a = Permission::new("a", "com.acme.A");
        let b = Permission::new("b", "com.acme.B");
        store.add_principal_permission("alice", &a).await.unwrap();
        store.add_principal_permission("alice", &b).await.unwrap();

        let replaced = Permission::new("a", "com.acme.A").allow(AccessKind::Write);
        store.add_principal_permission("alice", &replaced).await.unwrap();

        let perms = store.principal_permissions("alice").await.unwrap();
        assert_eq!(perms, vec![replaced, b]);
        assert!(store.principal_permissions("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_with_predicate() {
        let store = MemoryStore::new();
        for (id, owner) in [(1, 10), (2, 10), (3, 11)] {
            store
                .insert_entity(&invoice(), EntityId(id), json!({ "owner": owner }))
                .await
                .unwrap();
        }

        let owned = CompiledCondition::new(
            "own",
            "self.owner == ?1",
            vec![QueryParam::Value(json!(10))],
        )
        .unwrap();

        let pred = Predicate::and(
            owned.into(),
            Predicate::in_set("id", [EntityId(1), EntityId(3)]),
        );
        assert_eq!(store.count(&invoice(), &pred).await.unwrap(), 1);

        let unknown = EntityType::new("com.acme.Order");
        assert_eq!(store.count(&unknown, &pred).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_non_object_rows() {
        let store = MemoryStore::new();
        let err = store
            .insert_entity(&invoice(), EntityId(1), json!([1, 2]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }
}
