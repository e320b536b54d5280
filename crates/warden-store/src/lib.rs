//! # Warden Store
//!
//! Storage abstraction for Warden. Provides trait-based interfaces for the
//! two collaborators the decision engine consults: the permission store
//! (principal, role and group permissions) and the entity store (row counts
//! under a [`Predicate`](warden_core::Predicate)).
//!
//! ## Key Types
//!
//! - [`PermissionStore`] - Permission lookup by principal, role and group
//! - [`EntityStore`] - Predicate-restricted row counting
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden_store::{EntityStore, SqliteStore};
//! use warden_core::{EntityId, EntityType, Predicate};
//!
//! async fn example() {
//!     let store = SqliteStore::open("warden.db").unwrap();
//!
//!     let invoices = EntityType::new("com.acme.Invoice");
//!     let only = Predicate::in_set("id", [EntityId(1), EntityId(2)]);
//!     let visible = store.count(&invoices, &only).await.unwrap();
//!     println!("{visible} rows");
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Ordered lookups**: role, group and principal permissions come back in
//!   insertion order, so resolution is deterministic.
//! - **Predicate pushdown**: `SqliteStore` lowers predicates to SQL over JSON
//!   rows; `MemoryStore` evaluates them row by row. Both agree on results.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sql;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{EntityStore, PermissionStore};
