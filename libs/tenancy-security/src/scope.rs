use serde::{Deserialize, Serialize};

use crate::tenant::TenantId;

/// Tenant identity of one logical call chain.
///
/// `tenant_id` is fixed when the scope is opened. `ignore_isolation` starts
/// out `false` and may be flipped by the policy gate before business logic
/// runs. Both the super tenant and the ignore flag disable row filtering,
/// independently of each other.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantScope {
    tenant_id: TenantId,
    ignore_isolation: bool,
}

impl TenantScope {
    /// Scope for `tenant_id` with isolation enforced.
    #[must_use]
    pub fn new(tenant_id: impl Into<TenantId>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ignore_isolation: false,
        }
    }

    /// Scope for the platform operator tenant.
    #[must_use]
    pub fn super_tenant() -> Self {
        Self::new(TenantId::super_tenant())
    }

    #[must_use]
    pub fn with_ignore_isolation(mut self, ignore: bool) -> Self {
        self.ignore_isolation = ignore;
        self
    }

    #[inline]
    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    #[inline]
    #[must_use]
    pub fn ignore_isolation(&self) -> bool {
        self.ignore_isolation
    }

    /// `true` when rows must not be filtered for this scope: either the
    /// ignore flag is set or the tenant is the super tenant.
    #[must_use]
    pub fn bypasses_isolation(&self) -> bool {
        self.ignore_isolation || self.tenant_id.is_super()
    }

    /// The tenant rows must be restricted to, or `None` when bypassed.
    #[must_use]
    pub fn enforced_tenant(&self) -> Option<&TenantId> {
        if self.bypasses_isolation() {
            None
        } else {
            Some(&self.tenant_id)
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn new_scope_enforces_isolation() {
        let scope = TenantScope::new("t1");
        assert!(!scope.ignore_isolation());
        assert!(!scope.bypasses_isolation());
        assert_eq!(scope.enforced_tenant(), Some(&TenantId::new("t1")));
    }

    #[test]
    fn super_tenant_bypasses() {
        let scope = TenantScope::super_tenant();
        assert!(scope.bypasses_isolation());
        assert_eq!(scope.enforced_tenant(), None);
    }

    #[test]
    fn ignore_flag_bypasses_for_regular_tenant() {
        let scope = TenantScope::new("t1").with_ignore_isolation(true);
        assert!(scope.bypasses_isolation());
        assert_eq!(scope.enforced_tenant(), None);
    }

    #[test]
    fn super_and_ignore_are_ored() {
        let both = TenantScope::super_tenant().with_ignore_isolation(true);
        let super_only = TenantScope::super_tenant();
        let ignore_only = TenantScope::new("t2").with_ignore_isolation(true);
        assert!(both.bypasses_isolation());
        assert!(super_only.bypasses_isolation());
        assert!(ignore_only.bypasses_isolation());
    }
}
