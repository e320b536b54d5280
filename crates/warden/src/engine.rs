//! The authorization engine: the decision operations callers use.
//!
//! Every decision follows the same path. The current principal is looked up;
//! unauthenticated calls and administrators bypass all checks. Otherwise the
//! resolver chain picks the applicable permissions, and either an
//! unconditional grant decides immediately or the conditional permissions are
//! compiled and composed into a row predicate.

use std::collections::BTreeSet;
use std::sync::Arc;

use warden_core::{AccessKind, EntityId, EntityType, Evaluator, Predicate, Principal};
use warden_perms::{compose, ConditionCompiler, PermissionSet, PrimaryResolver, ResolverChain};
use warden_store::{EntityStore, PermissionStore};

use crate::config::EngineConfig;
use crate::directory::PrincipalDirectory;
use crate::error::{EngineError, Result};

/// Decides what the current principal may do with rows of an entity type.
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct AuthorizationEngine {
    directory: Arc<dyn PrincipalDirectory>,
    entities: Arc<dyn EntityStore>,
    chain: ResolverChain,
    compiler: ConditionCompiler,
    config: EngineConfig,
}

impl AuthorizationEngine {
    /// Create an engine using the default expression evaluator.
    pub fn new(
        directory: Arc<dyn PrincipalDirectory>,
        permissions: Arc<dyn PermissionStore>,
        entities: Arc<dyn EntityStore>,
        config: EngineConfig,
    ) -> Self {
        let chain = ResolverChain::new(
            PrimaryResolver::new(permissions),
            config.resolvers.clone(),
        );
        Self {
            directory,
            entities,
            chain,
            compiler: ConditionCompiler::default(),
            config,
        }
    }

    /// Create an engine over a store that holds both permissions and rows.
    pub fn with_store<S>(
        directory: Arc<dyn PrincipalDirectory>,
        store: Arc<S>,
        config: EngineConfig,
    ) -> Self
    where
        S: PermissionStore + EntityStore + 'static,
    {
        Self::new(directory, store.clone(), store, config)
    }

    /// Evaluate scripted condition parameters with `evaluator`.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.compiler = ConditionCompiler::new(evaluator);
        self
    }

    /// The same engine, answering for the principal of `directory`.
    pub fn for_directory(&self, directory: Arc<dyn PrincipalDirectory>) -> Self {
        Self {
            directory,
            ..self.clone()
        }
    }

    /// The principal decisions are made for, or `None` when checks are
    /// bypassed.
    fn active_principal(&self) -> Option<Principal> {
        let Some(principal) = self.directory.current_principal() else {
            tracing::debug!("no authenticated principal, bypassing checks");
            return None;
        };
        if self.directory.is_administrator(&principal) {
            tracing::debug!(principal = %principal.code, "administrator, bypassing checks");
            return None;
        }
        Some(principal)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Decisions
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether the principal holds `role`, directly or through its group.
    ///
    /// Always true when checks are bypassed.
    pub async fn has_role(&self, role: &str) -> Result<bool> {
        let Some(principal) = self.active_principal() else {
            return Ok(true);
        };
        Ok(self.chain.primary().has_role(&principal, role).await?)
    }

    /// The access kinds the principal holds on `entity_type`, or on one row
    /// of it when `id` is given.
    pub async fn access_types(
        &self,
        entity_type: &EntityType,
        id: Option<EntityId>,
    ) -> Result<BTreeSet<AccessKind>> {
        let ids: Vec<EntityId> = id.into_iter().collect();
        let mut kinds = BTreeSet::new();
        for kind in AccessKind::ALL {
            if self.is_permitted(kind, entity_type, &ids).await? {
                kinds.insert(kind);
            }
        }
        Ok(kinds)
    }

    /// Whether the principal may perform `kind` on `entity_type`.
    ///
    /// With `ids`, every listed row must be visible under the composed
    /// predicate. Without them, any applicable permission suffices, even a
    /// conditional one that may match no row.
    pub async fn is_permitted(
        &self,
        kind: AccessKind,
        entity_type: &EntityType,
        ids: &[EntityId],
    ) -> Result<bool> {
        let Some(principal) = self.active_principal() else {
            return Ok(true);
        };

        let permissions = self.chain.resolve(&principal, entity_type, kind, ids).await?;
        if permissions.is_empty() {
            tracing::debug!(%kind, entity = %entity_type, "no applicable permissions");
            return Ok(false);
        }

        if permissions.has_blanket_grant(kind) {
            tracing::trace!(%kind, entity = %entity_type, "unconditional grant");
            return Ok(true);
        }

        if ids.is_empty() {
            return Ok(true);
        }

        let Some(predicate) = self.build_predicate(&principal, &permissions, ids)? else {
            return Ok(true);
        };

        let visible = self.entities.count(entity_type, &predicate).await?;
        let permitted = usize::try_from(visible).is_ok_and(|n| n == ids.len());
        tracing::debug!(
            %kind,
            entity = %entity_type,
            requested = ids.len(),
            visible,
            permitted,
            "counted rows under predicate"
        );
        Ok(permitted)
    }

    /// The predicate restricting `entity_type` rows to those the principal
    /// may `kind`, or `None` when no restriction applies.
    pub async fn filter(
        &self,
        kind: AccessKind,
        entity_type: &EntityType,
        ids: &[EntityId],
    ) -> Result<Option<Predicate>> {
        let Some(principal) = self.active_principal() else {
            return Ok(None);
        };

        let permissions = self.chain.resolve(&principal, entity_type, kind, ids).await?;
        if permissions.is_empty() {
            return Ok(None);
        }

        self.build_predicate(&principal, &permissions, ids)
    }

    /// Like [`is_permitted`](Self::is_permitted), but a denial is an error.
    pub async fn check(
        &self,
        kind: AccessKind,
        entity_type: &EntityType,
        ids: &[EntityId],
    ) -> Result<()> {
        if self.is_permitted(kind, entity_type, ids).await? {
            return Ok(());
        }
        tracing::warn!(%kind, entity = %entity_type, ids = ?ids, "access denied");
        Err(EngineError::AuthorizationDenied {
            kind,
            entity: entity_type.clone(),
            ids: ids.to_vec(),
        })
    }

    /// Compile the conditional permissions and compose them with `ids`.
    fn build_predicate(
        &self,
        principal: &Principal,
        permissions: &PermissionSet,
        ids: &[EntityId],
    ) -> Result<Option<Predicate>> {
        let mut fragments = Vec::new();
        for permission in permissions.conditional() {
            if let Some(fragment) = self.compiler.compile_permission(principal, permission)? {
                fragments.push(fragment);
            }
        }

        let predicate = compose(fragments, ids, &self.config.id_field);
        if let Some(predicate) = &predicate {
            tracing::trace!(%predicate, "composed row predicate");
        }
        Ok(predicate)
    }
}
