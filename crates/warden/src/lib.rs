//! # Warden
//!
//! Row-level authorization for entity stores.
//!
//! ## Overview
//!
//! Warden answers four questions for the current principal:
//!
//! - **has_role**: does the principal hold a role, directly or via its group?
//! - **is_permitted / check**: may it read, write, create, remove, import or
//!   export rows of an entity type, optionally a specific set of rows?
//! - **filter**: which predicate restricts a query to the rows it may touch?
//! - **access_types**: which access kinds does it hold at all?
//!
//! Permissions come from a [`PermissionStore`](store::PermissionStore) and may
//! carry a row condition written in a small expression language. Conditions
//! are compiled into [`Predicate`]s and counted against an
//! [`EntityStore`](store::EntityStore).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use warden::{AccessKind, AuthorizationEngine, EngineConfig, EntityId, EntityType, Principal};
//! use warden::{StaticDirectory, store::SqliteStore};
//!
//! async fn example() {
//!     let store = Arc::new(SqliteStore::open("warden.db").unwrap());
//!     let config = EngineConfig::default();
//!
//!     let alice = Principal::new(7, "alice").with_role("accountant");
//!     let directory = Arc::new(StaticDirectory::new(Some(alice), &config));
//!     let engine = AuthorizationEngine::with_store(directory, store, config);
//!
//!     let invoices = EntityType::new("com.acme.Invoice");
//!     engine
//!         .check(AccessKind::Remove, &invoices, &[EntityId(1), EntityId(2)])
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `warden::core` - Core primitives (Principal, Permission, Predicate, ...)
//! - `warden::store` - Storage abstraction, SQLite and in-memory backends
//! - `warden::perms` - Resolver chain and condition compilation

pub mod config;
pub mod directory;
pub mod engine;
pub mod error;

// Re-export component crates
pub use warden_core as core;
pub use warden_perms as perms;
pub use warden_store as store;

// Re-export main types for convenience
pub use config::EngineConfig;
pub use directory::{PrincipalDirectory, StaticDirectory};
pub use engine::AuthorizationEngine;
pub use error::{EngineError, Result};

// Re-export commonly used types
pub use warden_core::{AccessKind, EntityId, EntityType, Permission, Predicate, Principal};
pub use warden_perms::{PermissionSet, Resolution, ResolverRegistry, SecondaryResolver};
