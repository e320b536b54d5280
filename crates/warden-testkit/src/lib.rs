//! # Warden Testkit
//!
//! Testing utilities for Warden.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: the invoice scenario (principals, roles, groups, rows)
//!   seeded into any store
//! - **Generators**: Proptest strategies for permissions, conditions and rows
//! - **Evaluators**: a [`CountingEvaluator`] to observe script evaluation
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use warden_testkit::fixtures::{alice, invoice_type, seeded_memory_store};
//!
//! async fn example() {
//!     let store = seeded_memory_store().await.unwrap();
//!     let principal = alice();
//!     let invoices = invoice_type();
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use warden_testkit::generators::{permission_from_params, PermissionParams};
//!
//! proptest! {
//!     #[test]
//!     fn blanket_grants_are_unconditional(params: PermissionParams) {
//!         let perm = permission_from_params(&params);
//!         prop_assert_eq!(perm.is_conditional(), params.condition.is_some());
//!     }
//! }
//! ```

pub mod evaluator;
pub mod fixtures;
pub mod generators;

pub use evaluator::CountingEvaluator;
pub use fixtures::{seed_invoices, seeded_memory_store};
