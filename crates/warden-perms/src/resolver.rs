//! The resolver chain: which permissions apply to a decision.
//!
//! A [`PrimaryResolver`] always exists and gathers permissions from the
//! [`PermissionStore`]. A single [`SecondaryResolver`] may be registered in a
//! [`ResolverRegistry`]; when present it is consulted first and may either
//! answer definitively or defer to the primary resolver.

use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;

use warden_core::{AccessKind, EntityId, EntityType, Permission, Principal};
use warden_store::PermissionStore;

use crate::error::{PermsError, Result};
use crate::set::PermissionSet;

/// Outcome of a secondary resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Use this set as-is. An empty set denies.
    Definitive(PermissionSet),
    /// Fall back to the primary resolver.
    NoOpinion,
}

/// Keep the permissions granting `kind` on `entity_type`.
///
/// Exact object matches come first, then matches on the type's package
/// wildcard (`com.acme.*`), each group in input order.
pub fn filter_permissions<'a>(
    permissions: impl IntoIterator<Item = &'a Permission>,
    entity_type: &EntityType,
    kind: AccessKind,
) -> PermissionSet {
    let wildcard = entity_type.package_wildcard();
    let mut exact = Vec::new();
    let mut by_package = Vec::new();

    for perm in permissions {
        if !perm.grants(kind) {
            continue;
        }
        if perm.object == entity_type.name() {
            exact.push(perm.clone());
        } else if wildcard.as_deref() == Some(perm.object.as_str()) {
            by_package.push(perm.clone());
        }
    }

    exact.into_iter().chain(by_package).collect()
}

/// An extension point consulted before the primary resolver.
#[async_trait]
pub trait SecondaryResolver: Send + Sync {
    async fn resolve(
        &self,
        principal: &Principal,
        entity_type: &EntityType,
        kind: AccessKind,
        ids: &[EntityId],
    ) -> Result<Resolution>;
}

/// Resolves permissions from the principal's own, role, group and group-role
/// permissions.
#[derive(Clone)]
pub struct PrimaryResolver {
    store: Arc<dyn PermissionStore>,
}

impl PrimaryResolver {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    /// Every permission reachable from `principal`, in source order: direct
    /// permissions, each role, the group, then each of the group's roles.
    ///
    /// Unknown roles and groups contribute nothing.
    pub async fn gather(&self, principal: &Principal) -> Result<Vec<Permission>> {
        let mut all = self.store.principal_permissions(&principal.code).await?;

        for name in &principal.roles {
            if let Some(role) = self.store.role(name).await? {
                all.extend(role.permissions);
            }
        }

        if let Some(code) = &principal.group {
            if let Some(group) = self.store.group(code).await? {
                all.extend(group.permissions);
                for name in &group.roles {
                    if let Some(role) = self.store.role(name).await? {
                        all.extend(role.permissions);
                    }
                }
            }
        }

        Ok(all)
    }

    pub async fn resolve(
        &self,
        principal: &Principal,
        entity_type: &EntityType,
        kind: AccessKind,
    ) -> Result<PermissionSet> {
        let all = self.gather(principal).await?;
        Ok(filter_permissions(&all, entity_type, kind))
    }

    /// Whether `principal` holds `role` directly or through its group.
    pub async fn has_role(&self, principal: &Principal, role: &str) -> Result<bool> {
        if principal.has_direct_role(role) {
            return Ok(true);
        }
        let Some(code) = &principal.group else {
            return Ok(false);
        };
        Ok(self
            .store
            .group(code)
            .await?
            .is_some_and(|group| group.roles.iter().any(|r| r == role)))
    }
}

/// Write-once slot for the secondary resolver.
///
/// Clones share the slot, so a registration made through any clone is seen
/// by all of them.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    slot: Arc<OnceLock<Arc<dyn SecondaryResolver>>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the secondary resolver. Fails if one is already registered.
    pub fn register(&self, resolver: impl SecondaryResolver + 'static) -> Result<()> {
        self.register_arc(Arc::new(resolver))
    }

    pub fn register_arc(&self, resolver: Arc<dyn SecondaryResolver>) -> Result<()> {
        self.slot.set(resolver).map_err(|_| {
            PermsError::Configuration("a secondary resolver is already registered".into())
        })?;
        tracing::debug!("registered secondary resolver");
        Ok(())
    }

    pub fn get(&self) -> Option<&Arc<dyn SecondaryResolver>> {
        self.slot.get()
    }

    pub fn is_registered(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("registered", &self.is_registered())
            .finish()
    }
}

/// Primary resolver plus the optional secondary one.
#[derive(Clone)]
pub struct ResolverChain {
    primary: PrimaryResolver,
    registry: ResolverRegistry,
}

impl ResolverChain {
    pub fn new(primary: PrimaryResolver, registry: ResolverRegistry) -> Self {
        Self { primary, registry }
    }

    pub fn primary(&self) -> &PrimaryResolver {
        &self.primary
    }

    /// The permissions that apply to this decision.
    pub async fn resolve(
        &self,
        principal: &Principal,
        entity_type: &EntityType,
        kind: AccessKind,
        ids: &[EntityId],
    ) -> Result<PermissionSet> {
        if let Some(secondary) = self.registry.get() {
            match secondary.resolve(principal, entity_type, kind, ids).await? {
                Resolution::Definitive(set) => {
                    tracing::debug!(
                        %entity_type,
                        %kind,
                        permissions = set.len(),
                        "secondary resolver answered"
                    );
                    return Ok(set);
                }
                Resolution::NoOpinion => {
                    tracing::trace!(%entity_type, %kind, "secondary resolver deferred");
                }
            }
        }

        self.primary.resolve(principal, entity_type, kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{Group, Role};
    use warden_store::MemoryStore;

    fn invoice() -> EntityType {
        EntityType::new("com.acme.Invoice")
    }

    fn names(set: &PermissionSet) -> Vec<&str> {
        set.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_filter_exact_before_wildcard() {
        let perms = vec![
            Permission::new("pkg", "com.acme.*").allow(AccessKind::Read),
            Permission::new("other", "com.acme.Order").allow(AccessKind::Read),
            Permission::new("exact", "com.acme.Invoice").allow(AccessKind::Read),
            Permission::new("no-read", "com.acme.Invoice").allow(AccessKind::Write),
            Permission::new("nested", "com.*").allow(AccessKind::Read),
        ];

        let set = filter_permissions(&perms, &invoice(), AccessKind::Read);
        assert_eq!(names(&set), ["exact", "pkg"]);

        let set = filter_permissions(&perms, &invoice(), AccessKind::Write);
        assert_eq!(names(&set), ["no-read"]);
    }

    #[test]
    fn test_filter_without_package() {
        let perms = vec![
            Permission::new("bare", "Invoice").allow(AccessKind::Read),
            Permission::new("star", "*").allow(AccessKind::Read),
        ];
        let set = filter_permissions(&perms, &EntityType::new("Invoice"), AccessKind::Read);
        assert_eq!(names(&set), ["bare"]);
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .add_principal_permission(
                "alice",
                &Permission::new("direct", "com.acme.*").allow(AccessKind::Read),
            )
            .await
            .unwrap();
        store
            .upsert_role(
                &Role::new("clerk")
                    .with_permission(Permission::new("clerk", "com.acme.Invoice").allow(AccessKind::Read)),
            )
            .await
            .unwrap();
        store
            .upsert_role(
                &Role::new("auditor")
                    .with_permission(Permission::new("audit", "com.acme.Invoice").allow(AccessKind::Read)),
            )
            .await
            .unwrap();
        store
            .upsert_group(
                &Group::new("finance")
                    .with_role("auditor")
                    .with_role("ghost")
                    .with_permission(Permission::new("group", "com.acme.Invoice").allow(AccessKind::Read)),
            )
            .await
            .unwrap();
        store
    }

    fn alice() -> Principal {
        Principal::new(1, "alice")
            .with_role("clerk")
            .with_role("missing")
            .with_group("finance")
    }

    #[tokio::test]
    async fn test_primary_gathers_all_sources_in_order() {
        let primary = PrimaryResolver::new(seeded_store().await);

        let set = primary
            .resolve(&alice(), &invoice(), AccessKind::Read)
            .await
            .unwrap();
        assert_eq!(names(&set), ["clerk", "group", "audit", "direct"]);

        let nobody = Principal::new(2, "bob").with_group("nowhere");
        let set = primary
            .resolve(&nobody, &invoice(), AccessKind::Read)
            .await
            .unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_has_role_checks_group_roles() {
        let primary = PrimaryResolver::new(seeded_store().await);

        assert!(primary.has_role(&alice(), "clerk").await.unwrap());
        assert!(primary.has_role(&alice(), "auditor").await.unwrap());
        assert!(!primary.has_role(&alice(), "admin").await.unwrap());
    }

    struct Fixed(Resolution);

    #[async_trait]
    impl SecondaryResolver for Fixed {
        async fn resolve(
            &self,
            _principal: &Principal,
            _entity_type: &EntityType,
            _kind: AccessKind,
            _ids: &[EntityId],
        ) -> Result<Resolution> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_register_twice_fails() {
        let registry = ResolverRegistry::new();
        registry.register(Fixed(Resolution::NoOpinion)).unwrap();

        let err = registry.register(Fixed(Resolution::NoOpinion)).unwrap_err();
        assert!(matches!(err, PermsError::Configuration(_)));

        // Clones share the slot
        let clone = registry.clone();
        assert!(clone.register(Fixed(Resolution::NoOpinion)).is_err());
    }

    #[tokio::test]
    async fn test_chain_falls_back_on_no_opinion() {
        let primary = PrimaryResolver::new(seeded_store().await);
        let registry = ResolverRegistry::new();
        registry.register(Fixed(Resolution::NoOpinion)).unwrap();
        let chain = ResolverChain::new(primary, registry);

        let set = chain
            .resolve(&alice(), &invoice(), AccessKind::Read, &[])
            .await
            .unwrap();
        assert_eq!(set.len(), 4);
    }

    #[tokio::test]
    async fn test_chain_uses_definitive_answer() {
        let primary = PrimaryResolver::new(seeded_store().await);
        let registry = ResolverRegistry::new();
        registry
            .register(Fixed(Resolution::Definitive(PermissionSet::new())))
            .unwrap();
        let chain = ResolverChain::new(primary, registry);

        let set = chain
            .resolve(&alice(), &invoice(), AccessKind::Read, &[EntityId(1)])
            .await
            .unwrap();
        assert!(set.is_empty());
    }
}
