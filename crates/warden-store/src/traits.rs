//! Store traits: the abstract interfaces the decision engine consults.
//!
//! These traits keep the engine storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use serde_json::Value;
use warden_core::{EntityId, EntityType, Group, Permission, Predicate, Role};

use crate::error::Result;

/// Lookup of permissions attached to principals, roles and groups.
///
/// Every method returns permissions in insertion order. Unknown principals,
/// roles and groups are not errors: they simply contribute nothing.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// Permissions attached directly to the principal with login `code`.
    async fn principal_permissions(&self, code: &str) -> Result<Vec<Permission>>;

    /// A role and its permissions.
    async fn role(&self, name: &str) -> Result<Option<Role>>;

    /// A group with its role names and permissions.
    async fn group(&self, code: &str) -> Result<Option<Group>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace a role (and the permissions it carries).
    async fn upsert_role(&self, role: &Role) -> Result<()>;

    /// Insert or replace a group (and the permissions it carries).
    async fn upsert_group(&self, group: &Group) -> Result<()>;

    /// Attach a permission directly to the principal with login `code`.
    async fn add_principal_permission(&self, code: &str, permission: &Permission) -> Result<()>;
}

/// Row storage the engine counts against.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert or replace a row. `row` must be a JSON object; its `id` field is
    /// set from `id`.
    async fn insert_entity(&self, entity_type: &EntityType, id: EntityId, row: Value)
        -> Result<()>;

    /// Number of rows of `entity_type` satisfying `predicate`.
    async fn count(&self, entity_type: &EntityType, predicate: &Predicate) -> Result<u64>;
}
