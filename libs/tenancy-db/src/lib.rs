#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Generic data-access API and the tenant isolation middleware on top of it.
//!
//! Callers talk to a [`DataStore`] through [`DataStoreExt::model`]. Wrapping
//! the store in [`TenantIsolation`] makes every operation on a tenant-scoped
//! entity carry the ambient tenant: reads and bulk writes get a `tenantId`
//! predicate, creates get the field stamped.
//!
//! ```ignore
//! let store = TenantIsolation::new(MemoryStore::new());
//! let scope = TenantScope::new("100001");
//! let users = context::run(scope, store.model("SysUser").find_many(None)).await?;
//! ```

/// Column carrying the owning tenant on every scoped entity.
pub const TENANT_FIELD: &str = "tenantId";

pub mod client;
pub mod filter;
pub mod interceptor;
pub mod memory;
pub mod operation;
pub mod registry;
pub mod store;

pub use client::{DataStoreExt, Model};
pub use filter::{FieldFilter, FieldOp, Filter};
pub use interceptor::{
    Decision, TenantIsolation, add_tenant_filter, decide, rewrite_operation, stamp_record,
    stamp_tenant_id,
};
pub use memory::MemoryStore;
pub use operation::{AggregateFn, Group, Operation, OperationKind, Outcome, Record};
pub use registry::{EntityClass, classify, is_scoped};
pub use store::{DataStore, StoreError};
