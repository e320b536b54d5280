//! # Warden Core
//!
//! Pure primitives for Warden: principals, permissions, the expression
//! language, and composable row predicates.
//!
//! This crate contains no I/O and no storage. It is pure computation over the
//! authorization data model.
//!
//! ## Key Types
//!
//! - [`Principal`] - The authenticated actor a decision is made for
//! - [`AccessKind`] - Closed set of operations (read, write, create, ...)
//! - [`Permission`] - A rule granting capabilities over an entity type or package
//! - [`Predicate`] - A composable row restriction pushed into an entity store
//! - [`Evaluator`] - Pluggable scripted-expression evaluation
//!
//! ## Expressions
//!
//! Permission conditions and their parameters share one small expression
//! language. See the [`expr`] module for the grammar.

pub mod access;
pub mod error;
pub mod eval;
pub mod expr;
pub mod permission;
pub mod predicate;
pub mod principal;
pub mod types;

pub use access::AccessKind;
pub use error::{Result, ScriptError};
pub use eval::{is_truthy, Bindings, Evaluator, ExprEvaluator, USER_BINDING};
pub use expr::{parse_expression, BinOp, Expr};
pub use permission::{Group, Permission, Role};
pub use predicate::{CompiledCondition, Predicate, QueryParam, ROW_BINDING};
pub use principal::Principal;
pub use types::{EntityId, EntityType};
