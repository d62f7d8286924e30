//! Tenant isolation middleware for [`DataStore`].
//!
//! [`TenantIsolation`] wraps any store and rewrites every operation on a
//! scoped entity before forwarding it:
//!
//! | Operation | Rewrite |
//! |-----------|---------|
//! | `findMany`, `findFirst`, `count`, `aggregate`, `groupBy` | AND `tenantId == T` into the filter |
//! | `findUnique`, `delete` | none (point operations by unique key) |
//! | `create` | set `tenantId = T` when the payload has none |
//! | `createMany` | same, per row |
//! | `update`, `updateMany`, `deleteMany` | AND `tenantId == T` into the filter |
//! | `upsert` | stamp the `create` branch only |
//!
//! Nothing is rewritten when the entity is unscoped, no scope is open, the
//! scope ignores isolation, or the tenant is the super tenant. Rewriting
//! happens synchronously right before dispatch and never fails.

use async_trait::async_trait;
use serde_json::Value;
use tenancy_security::{TenantId, TenantScope, context};
use tracing::{debug, warn};

use crate::TENANT_FIELD;
use crate::filter::Filter;
use crate::operation::{Operation, Outcome, Record};
use crate::registry;
use crate::store::{DataStore, StoreError};

/// Why an operation was, or was not, rewritten.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Isolation switched off in configuration.
    Disabled,
    /// Entity not in the scoped registry.
    Unscoped,
    /// Scoped entity touched outside any tenant scope; forwarded as is.
    NoScope,
    /// The scope's ignore flag is set.
    Ignored,
    /// The scope belongs to the super tenant.
    SuperTenant,
    /// Restrict to this tenant.
    Enforce(TenantId),
}

/// Decide how `entity` is treated under `scope`.
#[must_use]
pub fn decide(enabled: bool, scope: Option<&TenantScope>, entity: &str) -> Decision {
    if !enabled {
        return Decision::Disabled;
    }
    if !registry::is_scoped(entity) {
        return Decision::Unscoped;
    }
    let Some(scope) = scope else {
        return Decision::NoScope;
    };
    if scope.ignore_isolation() {
        return Decision::Ignored;
    }
    if scope.tenant_id().is_super() {
        return Decision::SuperTenant;
    }
    Decision::Enforce(scope.tenant_id().clone())
}

/// Set `tenantId` on `data` unless the caller already supplied one.
#[must_use]
pub fn stamp_record(mut data: Record, tenant: &TenantId) -> Record {
    data.entry(TENANT_FIELD)
        .or_insert_with(|| Value::String(tenant.as_str().to_owned()));
    data
}

/// Apply the rewrite table for a scoped entity and tenant `tenant`.
#[must_use]
pub fn rewrite_operation(op: Operation, tenant: &TenantId) -> Operation {
    let and_tenant = |filter: Option<Filter>| Some(Filter::and_tenant(filter, tenant));
    match op {
        Operation::FindMany { filter, take } => Operation::FindMany {
            filter: and_tenant(filter),
            take,
        },
        Operation::FindFirst { filter } => Operation::FindFirst {
            filter: and_tenant(filter),
        },
        Operation::Count { filter } => Operation::Count {
            filter: and_tenant(filter),
        },
        Operation::Aggregate {
            filter,
            func,
            field,
        } => Operation::Aggregate {
            filter: and_tenant(filter),
            func,
            field,
        },
        Operation::GroupBy { filter, by } => Operation::GroupBy {
            filter: and_tenant(filter),
            by,
        },
        Operation::Create { data } => Operation::Create {
            data: stamp_record(data, tenant),
        },
        Operation::CreateMany { data } => Operation::CreateMany {
            data: data.into_iter().map(|r| stamp_record(r, tenant)).collect(),
        },
        Operation::Update { filter, data } => Operation::Update {
            filter: Filter::and_tenant(Some(filter), tenant),
            data,
        },
        Operation::UpdateMany { filter, data } => Operation::UpdateMany {
            filter: and_tenant(filter),
            data,
        },
        Operation::DeleteMany { filter } => Operation::DeleteMany {
            filter: and_tenant(filter),
        },
        Operation::Upsert {
            filter,
            create,
            update,
        } => Operation::Upsert {
            filter,
            create: stamp_record(create, tenant),
            update,
        },
        // TODO: decide whether point lookups should verify the fetched
        // row's tenant and fail on mismatch instead of trusting the key.
        op @ (Operation::FindUnique { .. } | Operation::Delete { .. }) => op,
    }
}

/// AND the ambient tenant into `filter` for hand-written queries that do not
/// go through [`TenantIsolation`].
///
/// Returns `filter` unchanged when no scope is open or the scope bypasses
/// isolation.
#[must_use]
pub fn add_tenant_filter(filter: Option<Filter>) -> Option<Filter> {
    match context::current().as_ref().and_then(TenantScope::enforced_tenant) {
        Some(tenant) => Some(Filter::and_tenant(filter, tenant)),
        None => filter,
    }
}

/// Stamp the ambient tenant onto `data` for hand-written inserts.
///
/// Same bypass rules as [`add_tenant_filter`]; an explicit `tenantId` in
/// `data` is never overwritten.
#[must_use]
pub fn stamp_tenant_id(data: Record) -> Record {
    match context::current().as_ref().and_then(TenantScope::enforced_tenant) {
        Some(tenant) => stamp_record(data, tenant),
        None => data,
    }
}

/// [`DataStore`] middleware enforcing row-level tenant isolation.
pub struct TenantIsolation<S> {
    inner: S,
    enabled: bool,
}

impl<S> TenantIsolation<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            enabled: true,
        }
    }

    /// Switch rewriting on or off (single-tenant deployments).
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Rewrite `op` for `entity` under an explicitly passed scope.
    #[must_use]
    pub fn rewrite(&self, scope: Option<&TenantScope>, entity: &str, op: Operation) -> Operation {
        let kind = op.kind();
        match decide(self.enabled, scope, entity) {
            Decision::Enforce(tenant) => {
                debug!(entity, op = %kind, tenant_id = %tenant, "tenant isolation applied");
                rewrite_operation(op, &tenant)
            }
            Decision::NoScope => {
                warn!(entity, op = %kind, "scoped entity accessed without tenant scope");
                op
            }
            decision => {
                debug!(entity, op = %kind, ?decision, "tenant isolation skipped");
                op
            }
        }
    }
}

impl<S: DataStore> TenantIsolation<S> {
    /// Execute with an explicitly threaded scope instead of the ambient one.
    ///
    /// # Errors
    ///
    /// Whatever the wrapped store returns.
    pub async fn execute_in(
        &self,
        scope: Option<&TenantScope>,
        entity: &str,
        op: Operation,
    ) -> Result<Outcome, StoreError> {
        let op = self.rewrite(scope, entity, op);
        self.inner.execute(entity, op).await
    }
}

#[async_trait]
impl<S: DataStore> DataStore for TenantIsolation<S> {
    #[tracing::instrument(level = "trace", skip_all, fields(entity = %entity, op = %op.kind()))]
    async fn execute(&self, entity: &str, op: Operation) -> Result<Outcome, StoreError> {
        let scope = context::current();
        self.execute_in(scope.as_ref(), entity, op).await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::AggregateFn;

    fn t1() -> TenantId {
        TenantId::new("t1")
    }

    fn record(v: serde_json::Value) -> Record {
        match v {
            serde_json::Value::Object(m) => m,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn decide_covers_every_bypass() {
        let t1_scope = TenantScope::new("t1");
        assert_eq!(decide(false, Some(&t1_scope), "SysUser"), Decision::Disabled);
        assert_eq!(decide(true, Some(&t1_scope), "SysTenant"), Decision::Unscoped);
        assert_eq!(decide(true, None, "SysUser"), Decision::NoScope);
        assert_eq!(
            decide(true, Some(&t1_scope.clone().with_ignore_isolation(true)), "SysUser"),
            Decision::Ignored
        );
        assert_eq!(
            decide(true, Some(&TenantScope::super_tenant()), "SysUser"),
            Decision::SuperTenant
        );
        assert_eq!(
            decide(true, Some(&t1_scope), "SysUser"),
            Decision::Enforce(t1())
        );
    }

    #[test]
    fn reads_and_aggregates_get_tenant_filter() {
        let cases = vec![
            Operation::FindMany { filter: None, take: Some(5) },
            Operation::FindFirst { filter: None },
            Operation::Count { filter: None },
            Operation::Aggregate { filter: None, func: AggregateFn::Sum, field: "orderNum".into() },
            Operation::GroupBy { filter: None, by: vec!["status".into()] },
            Operation::DeleteMany { filter: None },
            Operation::UpdateMany { filter: None, data: Record::new() },
        ];
        for op in cases {
            let kind = op.kind();
            let rewritten = rewrite_operation(op, &t1());
            let filter = match rewritten {
                Operation::FindMany { filter, take } => {
                    assert_eq!(take, Some(5));
                    filter
                }
                Operation::FindFirst { filter }
                | Operation::Count { filter }
                | Operation::Aggregate { filter, .. }
                | Operation::GroupBy { filter, .. }
                | Operation::DeleteMany { filter }
                | Operation::UpdateMany { filter, .. } => filter,
                other => panic!("unexpected {other:?}"),
            };
            assert_eq!(filter, Some(Filter::eq("tenantId", "t1")), "{kind}");
        }
    }

    #[test]
    fn update_where_is_restructured() {
        let filter = Filter::or(vec![Filter::eq("name", "a"), Filter::eq("name", "b")]);
        let op = Operation::Update {
            filter: filter.clone(),
            data: record(json!({"name": "c"})),
        };
        let Operation::Update { filter: merged, data } = rewrite_operation(op, &t1()) else {
            panic!("kind changed");
        };
        assert_eq!(merged, Filter::and(vec![Filter::eq("tenantId", "t1"), filter]));
        assert!(!data.contains_key("tenantId"));
    }

    #[test]
    fn point_operations_are_untouched() {
        let lookup = Operation::FindUnique { filter: Filter::eq("id", 1) };
        assert_eq!(rewrite_operation(lookup.clone(), &t1()), lookup);
        let delete = Operation::Delete { filter: Filter::eq("id", 1) };
        assert_eq!(rewrite_operation(delete.clone(), &t1()), delete);
    }

    #[test]
    fn create_stamps_missing_tenant_only() {
        let op = Operation::Create { data: record(json!({"userName": "a"})) };
        let Operation::Create { data } = rewrite_operation(op, &t1()) else {
            panic!("kind changed");
        };
        assert_eq!(data.get("tenantId"), Some(&json!("t1")));

        let op = Operation::Create { data: record(json!({"userName": "a", "tenantId": "X"})) };
        let Operation::Create { data } = rewrite_operation(op, &t1()) else {
            panic!("kind changed");
        };
        assert_eq!(data.get("tenantId"), Some(&json!("X")));
    }

    #[test]
    fn create_many_stamps_each_row_independently() {
        let op = Operation::CreateMany {
            data: vec![
                record(json!({"dictLabel": "a"})),
                record(json!({"dictLabel": "b", "tenantId": "X"})),
            ],
        };
        let Operation::CreateMany { data } = rewrite_operation(op, &t1()) else {
            panic!("kind changed");
        };
        assert_eq!(data[0].get("tenantId"), Some(&json!("t1")));
        assert_eq!(data[1].get("tenantId"), Some(&json!("X")));
    }

    #[test]
    fn upsert_stamps_create_branch_only() {
        let op = Operation::Upsert {
            filter: Filter::eq("configKey", "k"),
            create: record(json!({"configKey": "k"})),
            update: record(json!({"configValue": "v"})),
        };
        let Operation::Upsert { filter, create, update } = rewrite_operation(op, &t1()) else {
            panic!("kind changed");
        };
        assert_eq!(filter, Filter::eq("configKey", "k"));
        assert_eq!(create.get("tenantId"), Some(&json!("t1")));
        assert!(!update.contains_key("tenantId"));
    }

    #[test]
    fn helpers_without_scope_are_identity() {
        let f = Some(Filter::eq("a", 1));
        assert_eq!(add_tenant_filter(f.clone()), f);
        let data = record(json!({"a": 1}));
        assert_eq!(stamp_tenant_id(data.clone()), data);
    }

    #[tokio::test]
    async fn helpers_follow_ambient_scope() {
        let (filter, data) = context::run(TenantScope::new("t1"), async {
            (
                add_tenant_filter(Some(Filter::eq("a", 1))),
                stamp_tenant_id(record(json!({"a": 1}))),
            )
        })
        .await;
        assert_eq!(
            filter,
            Some(Filter::and(vec![Filter::eq("tenantId", "t1"), Filter::eq("a", 1)]))
        );
        assert_eq!(data.get("tenantId"), Some(&json!("t1")));
    }

    #[tokio::test]
    async fn helpers_respect_bypass() {
        let out = context::run(TenantScope::super_tenant(), async {
            add_tenant_filter(None)
        })
        .await;
        assert_eq!(out, None);

        let out = context::run(TenantScope::new("t1").with_ignore_isolation(true), async {
            stamp_tenant_id(Record::new())
        })
        .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn missing_scope_is_logged_as_warning() {
        let store = TenantIsolation::new(crate::MemoryStore::new());
        let out = store
            .execute("SysDept", Operation::Count { filter: None })
            .await;
        assert!(matches!(out, Ok(Outcome::Count(0))));
        assert!(logs_contain("scoped entity accessed without tenant scope"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn enforcement_is_logged_with_tenant() {
        let store = TenantIsolation::new(crate::MemoryStore::new());
        let out = context::run(TenantScope::new("t9"), async {
            store.execute("SysDept", Operation::Count { filter: None }).await
        })
        .await;
        assert!(matches!(out, Ok(Outcome::Count(0))));
        assert!(logs_contain("tenant isolation applied"));
        assert!(logs_contain("tenant_id=t9"));
    }
}
