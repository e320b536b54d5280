//! Test fixtures and helpers.
//!
//! The invoice scenario used across integration tests:
//!
//! | id | owner | status |
//! |----|-------|--------|
//! | 1  | 1     | open   |
//! | 2  | 1     | paid   |
//! | 3  | 2     | open   |
//! | 4  | 2     | paid   |
//! | 5  | 3     | draft  |
//!
//! - role `accountant`: read, write and remove own invoices (`self.owner == ?1`)
//! - role `auditor`: unconditional export on the whole `com.acme` package
//! - group `finance`: read open invoices, plus the `auditor` role
//! - principal `bob`: direct unconditional read on invoices

use serde_json::json;

use warden_core::{AccessKind, EntityId, EntityType, Group, Permission, Principal, Role};
use warden_store::{EntityStore, MemoryStore, PermissionStore, Result};

/// Entity type of the invoice scenario.
pub fn invoice_type() -> EntityType {
    EntityType::new("com.acme.Invoice")
}

/// An entity type in the same package with no rows.
pub fn order_type() -> EntityType {
    EntityType::new("com.acme.Order")
}

/// Accountant in the finance group; owns invoices 1 and 2.
pub fn alice() -> Principal {
    Principal::new(1, "alice")
        .with_name("Alice")
        .with_role("accountant")
        .with_group("finance")
}

/// Holds a direct read permission; owns invoices 3 and 4.
pub fn bob() -> Principal {
    Principal::new(2, "bob").with_name("Bob")
}

/// No permissions at all; owns invoice 5.
pub fn carol() -> Principal {
    Principal::new(3, "carol").with_name("Carol")
}

/// Administrator by login code.
pub fn admin() -> Principal {
    Principal::new(99, "admin").with_name("Administrator")
}

/// Rows of the invoice scenario as `(id, owner, status)`.
pub const INVOICES: [(i64, i64, &str); 5] = [
    (1, 1, "open"),
    (2, 1, "paid"),
    (3, 2, "open"),
    (4, 2, "paid"),
    (5, 3, "draft"),
];

pub fn own_invoices() -> Permission {
    Permission::new("invoice.own", "com.acme.Invoice")
        .allow(AccessKind::Read)
        .allow(AccessKind::Write)
        .allow(AccessKind::Remove)
        .with_condition("self.owner == ?1", Some("__user__"))
}

pub fn open_invoices() -> Permission {
    Permission::new("invoice.open", "com.acme.Invoice")
        .allow(AccessKind::Read)
        .with_condition("self.status == 'open'", None)
}

pub fn package_export() -> Permission {
    Permission::new("acme.export", "com.acme.*").allow(AccessKind::Export)
}

pub fn invoice_read() -> Permission {
    Permission::new("invoice.read", "com.acme.Invoice").allow(AccessKind::Read)
}

/// Write the invoice scenario into `store`.
pub async fn seed_invoices<S>(store: &S) -> Result<()>
where
    S: PermissionStore + EntityStore,
{
    store
        .upsert_role(&Role::new("accountant").with_permission(own_invoices()))
        .await?;
    store
        .upsert_role(&Role::new("auditor").with_permission(package_export()))
        .await?;
    store
        .upsert_group(
            &Group::new("finance")
                .with_role("auditor")
                .with_permission(open_invoices()),
        )
        .await?;
    store.add_principal_permission("bob", &invoice_read()).await?;

    for (id, owner, status) in INVOICES {
        store
            .insert_entity(
                &invoice_type(),
                EntityId(id),
                json!({ "owner": owner, "status": status }),
            )
            .await?;
    }
    Ok(())
}

/// A memory store holding the invoice scenario.
pub async fn seeded_memory_store() -> Result<MemoryStore> {
    let store = MemoryStore::new();
    seed_invoices(&store).await?;
    Ok(store)
}

/// Identities as [`EntityId`]s.
pub fn ids(raw: &[i64]) -> Vec<EntityId> {
    raw.iter().copied().map(EntityId).collect()
}
