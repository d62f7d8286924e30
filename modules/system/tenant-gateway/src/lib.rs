#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! HTTP edge of the tenancy layer.
//!
//! Two axum middlewares, applied by [`with_tenancy`]:
//! 1. [`tenant_context_middleware`] resolves the tenant (header, query,
//!    super tenant) and opens the ambient scope. Malformed ids get a 400.
//! 2. [`policy_gate_middleware`] sets the scope's ignore flag for routes
//!    declared isolation-exempt.

pub mod config;
pub mod policy;
pub mod resolver;

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;

pub use config::{ConfigError, ENV_PREFIX, TenancyConfig};
pub use policy::{
    ControllerPolicy, IsolationPolicy, OperationPolicy, PolicyError, PolicySource,
    convert_axum_path_to_matchit, policy_gate_middleware,
};
pub use resolver::{MalformedTenant, TenantResolver, TenantSource, tenant_context_middleware};

/// Wrap `router` with the resolver (outer) and the policy gate (inner), so
/// the gate always runs inside the resolved scope.
pub fn with_tenancy<S>(router: Router<S>, resolver: TenantResolver, policy: IsolationPolicy) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(from_fn_with_state(policy, policy_gate_middleware))
        .layer(from_fn_with_state(Arc::new(resolver), tenant_context_middleware))
}
