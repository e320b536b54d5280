//! Where the engine learns who is asking.

use warden_core::Principal;

use crate::config::EngineConfig;

/// Source of the current principal.
pub trait PrincipalDirectory: Send + Sync {
    /// The authenticated principal, or `None` for an unauthenticated call.
    fn current_principal(&self) -> Option<Principal>;

    /// Whether `principal` bypasses all checks.
    fn is_administrator(&self, principal: &Principal) -> bool;
}

/// A directory answering with a fixed principal.
///
/// Administrators are recognised by login code or by group code.
#[derive(Debug, Clone)]
pub struct StaticDirectory {
    principal: Option<Principal>,
    admin_code: String,
    admin_group: String,
}

impl StaticDirectory {
    pub fn new(principal: Option<Principal>, config: &EngineConfig) -> Self {
        Self {
            principal,
            admin_code: config.admin_code.clone(),
            admin_group: config.admin_group.clone(),
        }
    }

    /// A directory for `principal`, with the default administrator names.
    pub fn signed_in(principal: Principal) -> Self {
        Self::new(Some(principal), &EngineConfig::default())
    }

    /// A directory with no authenticated principal.
    pub fn anonymous() -> Self {
        Self::new(None, &EngineConfig::default())
    }
}

impl PrincipalDirectory for StaticDirectory {
    fn current_principal(&self) -> Option<Principal> {
        self.principal.clone()
    }

    fn is_administrator(&self, principal: &Principal) -> bool {
        principal.code == self.admin_code
            || principal.group.as_deref() == Some(self.admin_group.as_str())
    }
}
