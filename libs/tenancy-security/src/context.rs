//! Ambient tenant scope for the current logical call chain.
//!
//! The scope is stored in a tokio task-local, so it follows the future that
//! [`run`] wraps across every `.await`, no matter which worker thread polls
//! it. Two tasks multiplexed onto the same worker never observe each other's
//! scope.
//!
//! ```
//! use tenancy_security::{TenantScope, context};
//!
//! # tokio_test_block_on(async {
//! let seen = context::run(TenantScope::new("t1"), async {
//!     context::tenant_id().map(|t| t.to_string())
//! })
//! .await;
//! assert_eq!(seen.as_deref(), Some("t1"));
//! assert!(context::tenant_id().is_none());
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```
//!
//! Spawned tasks do not inherit task-locals. Use [`spawn`] or [`propagate`]
//! to hand a snapshot of the current scope to a child task; changes the child
//! makes to its ignore flag stay in the child.

use std::cell::Cell;
use std::future::Future;

use crate::scope::TenantScope;
use crate::tenant::TenantId;

struct Ambient {
    tenant_id: TenantId,
    ignore_isolation: Cell<bool>,
}

impl Ambient {
    fn from_scope(scope: TenantScope) -> Self {
        let ignore = scope.ignore_isolation();
        Self {
            tenant_id: scope.tenant_id().clone(),
            ignore_isolation: Cell::new(ignore),
        }
    }

    fn snapshot(&self) -> TenantScope {
        TenantScope::new(self.tenant_id.clone()).with_ignore_isolation(self.ignore_isolation.get())
    }
}

tokio::task_local! {
    static AMBIENT: Ambient;
}

/// Run `fut` with `scope` as the ambient tenant scope.
///
/// Everything `fut` awaits sees the scope. A nested `run` shadows it for the
/// inner future only.
pub async fn run<F>(scope: TenantScope, fut: F) -> F::Output
where
    F: Future,
{
    AMBIENT.scope(Ambient::from_scope(scope), fut).await
}

/// Synchronous counterpart of [`run`].
pub fn sync_run<R>(scope: TenantScope, f: impl FnOnce() -> R) -> R {
    AMBIENT.sync_scope(Ambient::from_scope(scope), f)
}

/// Tenant id of the current scope, `None` outside any scope.
#[must_use]
pub fn tenant_id() -> Option<TenantId> {
    AMBIENT.try_with(|a| a.tenant_id.clone()).ok()
}

/// Ignore flag of the current scope; `false` outside any scope.
#[must_use]
pub fn ignore_isolation() -> bool {
    AMBIENT
        .try_with(|a| a.ignore_isolation.get())
        .unwrap_or(false)
}

/// Set the ignore flag of the current scope in place.
///
/// The change is visible to everything later in the same call chain.
/// Returns `false` (and changes nothing) when no scope is open.
pub fn set_ignore_isolation(ignore: bool) -> bool {
    AMBIENT
        .try_with(|a| a.ignore_isolation.set(ignore))
        .is_ok()
}

/// Snapshot of the current scope.
#[must_use]
pub fn current() -> Option<TenantScope> {
    AMBIENT.try_with(Ambient::snapshot).ok()
}

/// Whether a scope is open for the current call chain.
#[must_use]
pub fn is_active() -> bool {
    AMBIENT.try_with(|_| ()).is_ok()
}

/// Wrap `fut` so it runs under a snapshot of the scope current *now*.
///
/// Useful when a future is built in one chain and polled in another
/// (spawned task, channel consumer).
pub fn propagate<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let scope = current();
    async move {
        match scope {
            Some(scope) => run(scope, fut).await,
            None => fut.await,
        }
    }
}

/// `tokio::spawn` that carries the current scope into the new task.
pub fn spawn<F>(fut: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(propagate(fut))
}
