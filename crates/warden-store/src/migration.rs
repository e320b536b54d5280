//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {current} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
///
/// Link tables are read back `ORDER BY rowid`, which preserves insertion order.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Permission records
        CREATE TABLE permissions (
            name TEXT PRIMARY KEY,
            object TEXT NOT NULL,             -- entity type or package wildcard (pkg.*)
            can_read INTEGER NOT NULL DEFAULT 0,
            can_write INTEGER NOT NULL DEFAULT 0,
            can_create INTEGER NOT NULL DEFAULT 0,
            can_remove INTEGER NOT NULL DEFAULT 0,
            can_import INTEGER NOT NULL DEFAULT 0,
            can_export INTEGER NOT NULL DEFAULT 0,
            condition TEXT,                   -- row condition, NULL for blanket grants
            condition_params TEXT             -- comma-separated parameter spec
        );

        CREATE INDEX idx_permissions_object ON permissions(object);

        -- Roles and their permissions
        CREATE TABLE roles (
            name TEXT PRIMARY KEY
        );

        CREATE TABLE role_permissions (
            role TEXT NOT NULL REFERENCES roles(name) ON DELETE CASCADE,
            permission TEXT NOT NULL REFERENCES permissions(name),
            PRIMARY KEY (role, permission)
        );

        -- Groups, their roles and permissions
        CREATE TABLE principal_groups (
            code TEXT PRIMARY KEY
        );

        CREATE TABLE group_roles (
            group_code TEXT NOT NULL REFERENCES principal_groups(code) ON DELETE CASCADE,
            role TEXT NOT NULL,
            PRIMARY KEY (group_code, role)
        );

        CREATE TABLE group_permissions (
            group_code TEXT NOT NULL REFERENCES principal_groups(code) ON DELETE CASCADE,
            permission TEXT NOT NULL REFERENCES permissions(name),
            PRIMARY KEY (group_code, permission)
        );

        -- Permissions attached directly to a principal
        CREATE TABLE principal_permissions (
            principal TEXT NOT NULL,          -- login code
            permission TEXT NOT NULL REFERENCES permissions(name),
            PRIMARY KEY (principal, permission)
        );

        -- Entity rows, stored as JSON objects
        CREATE TABLE entities (
            entity_type TEXT NOT NULL,
            id INTEGER NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (entity_type, id)
        );
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
