//! SQLite implementation of the store traits.
//!
//! This is the persistent storage backend for Warden. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.
//!
//! Permission records are shared by name: attaching a permission to a role,
//! group or principal upserts the record itself, so the last write of a given
//! name wins everywhere it is linked.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use serde_json::Value;

use warden_core::{EntityId, EntityType, Group, Permission, Predicate, Role};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::sql::lower_predicate;
use crate::traits::{EntityStore, PermissionStore};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Lock(format!("mutex poisoned: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {e}")))?
    }
}

const PERMISSION_COLUMNS: &str = "p.name, p.object, p.can_read, p.can_write, p.can_create, \
     p.can_remove, p.can_import, p.can_export, p.condition, p.condition_params";

// Helper to convert a row to Permission
fn row_to_permission(row: &rusqlite::Row<'_>) -> rusqlite::Result<Permission> {
    Ok(Permission {
        name: row.get(0)?,
        object: row.get(1)?,
        can_read: row.get(2)?,
        can_write: row.get(3)?,
        can_create: row.get(4)?,
        can_remove: row.get(5)?,
        can_import: row.get(6)?,
        can_export: row.get(7)?,
        condition: row.get(8)?,
        condition_params: row.get(9)?,
    })
}

fn upsert_permission(tx: &Transaction<'_>, perm: &Permission) -> Result<()> {
    tx.execute(
        "INSERT INTO permissions (
            name, object, can_read, can_write, can_create, can_remove,
            can_import, can_export, condition, condition_params
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(name) DO UPDATE SET
            object = excluded.object,
            can_read = excluded.can_read,
            can_write = excluded.can_write,
            can_create = excluded.can_create,
            can_remove = excluded.can_remove,
            can_import = excluded.can_import,
            can_export = excluded.can_export,
            condition = excluded.condition,
            condition_params = excluded.condition_params",
        params![
            perm.name,
            perm.object,
            perm.can_read,
            perm.can_write,
            perm.can_create,
            perm.can_remove,
            perm.can_import,
            perm.can_export,
            perm.condition,
            perm.condition_params,
        ],
    )?;
    Ok(())
}

/// Permissions linked from `table` where `key_column = key`, in link order.
fn linked_permissions(
    conn: &Connection,
    table: &str,
    key_column: &str,
    key: &str,
) -> Result<Vec<Permission>> {
    let sql = format!(
        "SELECT {PERMISSION_COLUMNS} FROM {table} l
         JOIN permissions p ON p.name = l.permission
         WHERE l.{key_column} = ?1
         ORDER BY l.rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let perms = stmt
        .query_map([key], row_to_permission)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(perms)
}

#[async_trait]
impl PermissionStore for SqliteStore {
    async fn principal_permissions(&self, code: &str) -> Result<Vec<Permission>> {
        let code = code.to_string();
        self.run(move |conn| linked_permissions(conn, "principal_permissions", "principal", &code))
            .await
    }

    async fn role(&self, name: &str) -> Result<Option<Role>> {
        let name = name.to_string();
        self.run(move |conn| {
            let exists: Option<String> = conn
                .query_row("SELECT name FROM roles WHERE name = ?1", [&name], |row| {
                    row.get(0)
                })
                .optional()?;
            if exists.is_none() {
                return Ok(None);
            }

            let permissions = linked_permissions(conn, "role_permissions", "role", &name)?;
            Ok(Some(Role { name, permissions }))
        })
        .await
    }

    async fn group(&self, code: &str) -> Result<Option<Group>> {
        let code = code.to_string();
        self.run(move |conn| {
            let exists: Option<String> = conn
                .query_row(
                    "SELECT code FROM principal_groups WHERE code = ?1",
                    [&code],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Ok(None);
            }

            let mut stmt =
                conn.prepare("SELECT role FROM group_roles WHERE group_code = ?1 ORDER BY rowid")?;
            let roles = stmt
                .query_map([&code], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;

            let permissions = linked_permissions(conn, "group_permissions", "group_code", &code)?;
            Ok(Some(Group {
                code,
                roles,
                permissions,
            }))
        })
        .await
    }

    async fn upsert_role(&self, role: &Role) -> Result<()> {
        let role = role.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("INSERT OR IGNORE INTO roles (name) VALUES (?1)", [&role.name])?;
            tx.execute("DELETE FROM role_permissions WHERE role = ?1", [&role.name])?;
            for perm in &role.permissions {
                upsert_permission(&tx, perm)?;
                tx.execute(
                    "INSERT OR IGNORE INTO role_permissions (role, permission) VALUES (?1, ?2)",
                    params![role.name, perm.name],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn upsert_group(&self, group: &Group) -> Result<()> {
        let group = group.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO principal_groups (code) VALUES (?1)",
                [&group.code],
            )?;
            tx.execute("DELETE FROM group_roles WHERE group_code = ?1", [&group.code])?;
            tx.execute(
                "DELETE FROM group_permissions WHERE group_code = ?1",
                [&group.code],
            )?;
            for role in &group.roles {
                tx.execute(
                    "INSERT OR IGNORE INTO group_roles (group_code, role) VALUES (?1, ?2)",
                    params![group.code, role],
                )?;
            }
            for perm in &group.permissions {
                upsert_permission(&tx, perm)?;
                tx.execute(
                    "INSERT OR IGNORE INTO group_permissions (group_code, permission) VALUES (?1, ?2)",
                    params![group.code, perm.name],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn add_principal_permission(&self, code: &str, permission: &Permission) -> Result<()> {
        let code = code.to_string();
        let permission = permission.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            upsert_permission(&tx, &permission)?;
            // Keeps the existing link row, and with it the original position
            tx.execute(
                "INSERT OR IGNORE INTO principal_permissions (principal, permission) VALUES (?1, ?2)",
                params![code, permission.name],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl EntityStore for SqliteStore {
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
        let data = serde_json::to_string(&Value::Object(fields))?;
        let entity_type = entity_type.name().to_string();

        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO entities (entity_type, id, data) VALUES (?1, ?2, ?3)",
                params![entity_type, id.get(), data],
            )?;
            Ok(())
        })
        .await
    }

    async fn count(&self, entity_type: &EntityType, predicate: &Predicate) -> Result<u64> {
        let fragment = lower_predicate(predicate)?;
        let mut values = fragment.params;
        values.push(rusqlite::types::Value::Text(entity_type.name().to_string()));
        let sql = format!(
            "SELECT COUNT(*) FROM entities WHERE entity_type = ?{} AND ({})",
            values.len(),
            fragment.sql
        );

        tracing::trace!(%sql, "counting rows");
        self.run(move |conn| {
            let count: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
            u64::try_from(count)
                .map_err(|_| StoreError::InvalidData(format!("negative row count {count}")))
        })
        .await
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
        let store = SqliteStore::open_memory().unwrap();
        let role = Role::new("accountant")
            .with_permission(
                Permission::new("inv-read", "com.acme.Invoice")
                    .allow(AccessKind::Read)
                    .with_condition("self.owner == ?1", Some("__user__")),
            )
            .with_permission(Permission::new("all-export", "com.acme.*").allow(AccessKind::Export));

        store.upsert_role(&role).await.unwrap();
        assert_eq!(store.role("accountant").await.unwrap(), Some(role.clone()));

        // Replacing drops links that are gone
        let trimmed = Role::new("accountant").with_permission(role.permissions[1].clone());
        store.upsert_role(&trimmed).await.unwrap();
        assert_eq!(store.role("accountant").await.unwrap(), Some(trimmed));

        assert_eq!(store.role("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_group_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let group = Group::new("finance")
            .with_role("accountant")
            .with_role("auditor")
            .with_permission(Permission::new("ledger", "com.acme.Ledger").allow_all());

        store.upsert_group(&group).await.unwrap();
        assert_eq!(store.group("finance").await.unwrap(), Some(group));
        assert_eq!(store.group("sales").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_principal_permissions_keep_order() {
        let store = SqliteStore::open_memory().unwrap();
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
        let store = SqliteStore::open_memory().unwrap();
        for (id, owner, status) in [(1, 10, "open"), (2, 10, "paid"), (3, 11, "open")] {
            store
                .insert_entity(
                    &invoice(),
                    EntityId(id),
                    json!({ "owner": owner, "status": status }),
                )
                .await
                .unwrap();
        }

        let owned = CompiledCondition::new(
            "own",
            "self.owner == ?1 and self.status != 'paid'",
            vec![QueryParam::Value(json!(10))],
        )
        .unwrap();
        assert_eq!(store.count(&invoice(), &owned.clone().into()).await.unwrap(), 1);

        let pred = Predicate::and(
            owned.into(),
            Predicate::in_set("id", [EntityId(1), EntityId(3)]),
        );
        assert_eq!(store.count(&invoice(), &pred).await.unwrap(), 1);

        let all = Predicate::in_set("id", [EntityId(1), EntityId(2), EntityId(3)]);
        assert_eq!(store.count(&invoice(), &all).await.unwrap(), 3);

        let unknown = EntityType::new("com.acme.Order");
        assert_eq!(store.count(&unknown, &all).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_count_null_fields() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .insert_entity(&invoice(), EntityId(1), json!({ "owner": null }))
            .await
            .unwrap();
        store
            .insert_entity(&invoice(), EntityId(2), json!({}))
            .await
            .unwrap();
        store
            .insert_entity(&invoice(), EntityId(3), json!({ "owner": 5 }))
            .await
            .unwrap();

        let unowned = CompiledCondition::new("unowned", "self.owner == null", vec![]).unwrap();
        assert_eq!(store.count(&invoice(), &unowned.into()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_counts_follow_expression_semantics() {
        let sqlite = SqliteStore::open_memory().unwrap();
        let memory = crate::MemoryStore::new();
        let rows = [
            json!({ "status": "open", "paid": true, "total": 10, "tags": ["a", 1], "meta": {} }),
            json!({ "status": "", "paid": false, "total": 0, "tags": [] }),
            json!({ "status": "1", "paid": 1, "total": 2.5, "tags": [true] }),
        ];
        for (id, row) in (1..).zip(rows) {
            sqlite.insert_entity(&invoice(), EntityId(id), row.clone()).await.unwrap();
            memory.insert_entity(&invoice(), EntityId(id), row).await.unwrap();
        }

        let cases = [
            ("self.status", 2),
            ("not self.status", 1),
            ("self.paid", 2),
            ("self.paid == 1", 1),
            ("self.paid == true", 1),
            ("self.paid in [true, 'x']", 1),
            ("self.status == 1", 0),
            ("self.status < 'b'", 2),
            ("self.total", 2),
            ("self.total >= 2.5", 2),
            ("-self.total < 0", 2),
            ("self.tags", 2),
            ("self.meta", 1),
            ("self.meta != null", 1),
            ("self.missing == null", 3),
            ("self.missing != 1", 3),
            ("not (self.missing < 1)", 3),
            ("self.missing in [null]", 0),
            ("1 in self.tags", 1),
            ("true in self.tags", 1),
            ("self.id == 2", 1),
        ];
        for (query, expected) in cases {
            let pred: Predicate = CompiledCondition::new("c", query, vec![]).unwrap().into();
            assert_eq!(sqlite.count(&invoice(), &pred).await.unwrap(), expected, "sqlite: {query}");
            assert_eq!(memory.count(&invoice(), &pred).await.unwrap(), expected, "memory: {query}");
        }
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .upsert_role(&Role::new("clerk").with_permission(Permission::new("r", "com.acme.R")))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let role = store.role("clerk").await.unwrap().unwrap();
        assert_eq!(role.permissions.len(), 1);
    }
}
