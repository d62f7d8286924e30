#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Tenant identity and the ambient tenant scope.
//!
//! - [`TenantId`] / [`SUPER_TENANT_ID`] - tenant identifiers
//! - [`TenantScope`] - tenant id plus the ignore-isolation flag of one call chain
//! - [`context`] - task-local propagation of the scope (`run`, getters, flag)
//! - [`job`] - scope entry point for scheduled work

pub mod context;
pub mod job;
pub mod scope;
pub mod tenant;

pub use job::{JobTarget, run_job};
pub use scope::TenantScope;
pub use tenant::{MAX_TENANT_ID_LEN, SUPER_TENANT_ID, TenantId, TenantIdError};
