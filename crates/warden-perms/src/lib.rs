//! # Warden Permissions
//!
//! Permission resolution and condition compilation.
//!
//! ## Overview
//!
//! Deciding whether a principal may act on rows of an entity type happens in
//! three steps, each in its own module:
//!
//! 1. **Resolve**: the [`ResolverChain`] finds the permissions granting the
//!    requested [`AccessKind`](warden_core::AccessKind) on the entity type.
//! 2. **Compile**: the [`ConditionCompiler`] binds each row-conditional
//!    permission to the principal.
//! 3. **Compose**: [`compose`] ORs the compiled conditions together and
//!    restricts them to the requested identities.
//!
//! ## Resolution
//!
//! The [`PrimaryResolver`] reads the principal's direct, role, group and
//! group-role permissions from a
//! [`PermissionStore`](warden_store::PermissionStore). Exact entity-type
//! matches are ordered before package wildcard (`com.acme.*`) matches.
//!
//! A single [`SecondaryResolver`] may be registered in a
//! [`ResolverRegistry`]. It is asked first and either answers with a
//! [`Resolution::Definitive`] set (an empty set denies) or defers with
//! [`Resolution::NoOpinion`].

pub mod compose;
pub mod condition;
pub mod error;
pub mod resolver;
pub mod set;

pub use compose::compose;
pub use condition::ConditionCompiler;
pub use error::{PermsError, Result};
pub use resolver::{
    filter_permissions, PrimaryResolver, Resolution, ResolverChain, ResolverRegistry,
    SecondaryResolver,
};
pub use set::PermissionSet;
