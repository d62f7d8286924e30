//! Scope entry point for background work.
//!
//! Scheduled jobs have no inbound request to resolve a tenant from, so each
//! invocation must open its own scope before touching tenant data.

use std::future::Future;

use tracing::Instrument;

use crate::context;
use crate::scope::TenantScope;
use crate::tenant::TenantId;

/// Which tenant a job invocation acts as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobTarget {
    /// Platform-wide job, runs as the super tenant.
    Platform,
    /// Job bound to a single tenant; isolation is enforced.
    Tenant(TenantId),
}

impl JobTarget {
    #[must_use]
    pub fn scope(&self) -> TenantScope {
        match self {
            Self::Platform => TenantScope::super_tenant(),
            Self::Tenant(id) => TenantScope::new(id.clone()),
        }
    }
}

/// Run one job invocation under the scope implied by `target`.
pub async fn run_job<F>(name: &str, target: JobTarget, fut: F) -> F::Output
where
    F: Future,
{
    let scope = target.scope();
    let span = tracing::info_span!(
        "tenant_job",
        job = %name,
        tenant_id = %scope.tenant_id()
    );
    async move {
        tracing::debug!("job started");
        let out = context::run(scope, fut).await;
        tracing::debug!("job finished");
        out
    }
    .instrument(span)
    .await
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn platform_job_runs_as_super_tenant() {
        let seen = run_job("cleanup", JobTarget::Platform, async { context::current() }).await;
        let scope = seen.unwrap();
        assert!(scope.tenant_id().is_super());
        assert!(scope.bypasses_isolation());
    }

    #[tokio::test]
    async fn tenant_job_enforces_isolation() {
        let target = JobTarget::Tenant(TenantId::new("t7"));
        let seen = run_job("sync", target, async { context::current() }).await;
        assert_eq!(seen, Some(TenantScope::new("t7")));
    }

    #[tokio::test]
    async fn scope_closed_after_job() {
        run_job("noop", JobTarget::Platform, async {}).await;
        assert!(!context::is_active());
    }
}
