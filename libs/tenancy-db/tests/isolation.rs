#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use serde_json::{Value, json};
use tenancy_db::{
    DataStore, DataStoreExt, Filter, MemoryStore, Record, TenantIsolation, add_tenant_filter,
    stamp_tenant_id,
};
use tenancy_security::{SUPER_TENANT_ID, TenantScope, context};

fn rec(v: Value) -> Record {
    match v {
        Value::Object(m) => m,
        other => panic!("not an object: {other}"),
    }
}

fn tenant_of(row: &Record) -> &str {
    row.get("tenantId").and_then(Value::as_str).unwrap_or_default()
}

/// Two tenants with overlapping user names, plus one unscoped tenant table.
fn fixture() -> Arc<TenantIsolation<MemoryStore>> {
    let store = MemoryStore::new();
    store.seed(
        "SysUser",
        [
            rec(json!({"userName": "a", "tenantId": "t1", "status": "0"})),
            rec(json!({"userName": "b", "tenantId": "t1", "status": "0"})),
            rec(json!({"userName": "a", "tenantId": "t2", "status": "0"})),
            rec(json!({"userName": "c", "tenantId": "t2", "status": "1"})),
        ],
    );
    store.seed(
        "SysTenant",
        [
            rec(json!({"tenantId": "t1", "companyName": "One"})),
            rec(json!({"tenantId": "t2", "companyName": "Two"})),
        ],
    );
    Arc::new(TenantIsolation::new(store))
}

#[tokio::test]
async fn reads_only_return_own_tenant_rows() {
    let store = fixture();
    let users = context::run(TenantScope::new("t1"), async {
        store.model("SysUser").find_many(None).await.unwrap()
    })
    .await;
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|r| tenant_of(r) == "t1"));

    let n = context::run(TenantScope::new("t2"), async {
        store
            .model("SysUser")
            .count(Some(Filter::eq("userName", "a")))
            .await
            .unwrap()
    })
    .await;
    assert_eq!(n, 1);
}

#[tokio::test]
async fn unscoped_entities_are_never_filtered() {
    let store = fixture();
    let tenants = context::run(TenantScope::new("t1"), async {
        store.model("SysTenant").find_many(None).await.unwrap()
    })
    .await;
    assert_eq!(tenants.len(), 2);
}

#[tokio::test]
async fn create_stamps_missing_tenant_and_keeps_explicit_one() {
    let store = fixture();
    context::run(TenantScope::new("t1"), async {
        let users = store.model("SysUser");
        let stamped = users.create(rec(json!({"userName": "d"}))).await.unwrap();
        assert_eq!(tenant_of(&stamped), "t1");
        let explicit = users
            .create(rec(json!({"userName": "e", "tenantId": "X"})))
            .await
            .unwrap();
        assert_eq!(tenant_of(&explicit), "X");
    })
    .await;

    let persisted = store.inner().snapshot("SysUser");
    let d = persisted.iter().find(|r| r["userName"] == "d").unwrap();
    assert_eq!(tenant_of(d), "t1");
}

#[tokio::test]
async fn super_tenant_and_ignore_flag_bypass_isolation() {
    let store = fixture();
    let all = context::run(TenantScope::super_tenant(), async {
        store.model("SysUser").find_many(None).await.unwrap()
    })
    .await;
    assert_eq!(all.len(), 4);
    assert_eq!(TenantScope::super_tenant().tenant_id().as_str(), SUPER_TENANT_ID);

    let ignored = context::run(TenantScope::new("t1"), async {
        context::set_ignore_isolation(true);
        store.model("SysUser").find_many(None).await.unwrap()
    })
    .await;
    assert_eq!(ignored.len(), 4);
}

#[tokio::test]
async fn bulk_writes_leave_other_tenants_untouched() {
    let store = fixture();
    context::run(TenantScope::new("t1"), async {
        let users = store.model("SysUser");
        let updated = users
            .update_many(Some(Filter::eq("userName", "a")), rec(json!({"status": "1"})))
            .await
            .unwrap();
        assert_eq!(updated, 1);
        let deleted = users.delete_many(None).await.unwrap();
        assert_eq!(deleted, 2);
    })
    .await;

    let rows = store.inner().snapshot("SysUser");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| tenant_of(r) == "t2"));
    let a = rows.iter().find(|r| r["userName"] == "a").unwrap();
    assert_eq!(a["status"], json!("0"));
}

#[tokio::test]
async fn update_with_top_level_or_cannot_reach_other_tenant() {
    let store = fixture();
    let filter = Filter::or(vec![Filter::eq("userName", "a"), Filter::eq("userName", "b")]);
    context::run(TenantScope::new("t2"), async {
        let row = store
            .model("SysUser")
            .update(filter, rec(json!({"status": "9"})))
            .await
            .unwrap();
        assert_eq!(tenant_of(&row), "t2");
        assert_eq!(row["userName"], json!("a"));
    })
    .await;

    let rows = store.inner().snapshot("SysUser");
    for row in rows.iter().filter(|r| tenant_of(r) == "t1") {
        assert_eq!(row["status"], json!("0"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_tenants_never_see_each_other() {
    let store = fixture();
    let mut handles = Vec::new();
    for i in 0..64 {
        let tenant = if i % 2 == 0 { "t1" } else { "t2" };
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(context::run(
            TenantScope::new(tenant),
            async move {
                tokio::task::yield_now().await;
                let rows = store
                    .model("SysUser")
                    .find_many(Some(Filter::eq("userName", "a")))
                    .await
                    .unwrap();
                (tenant, rows)
            },
        )));
    }
    for handle in handles {
        let (tenant, rows) = handle.await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(tenant_of(&rows[0]), tenant);
    }
}

#[tokio::test]
async fn manual_helpers_round_trip_within_a_tenant() {
    // Raw store access: isolation is applied by the helpers alone.
    let raw = MemoryStore::new();
    context::run(TenantScope::new("t1"), async {
        let data = stamp_tenant_id(rec(json!({"noticeTitle": "hello"})));
        raw.model("SysNotice").create(data).await.unwrap();
        let found = raw
            .model("SysNotice")
            .find_many(add_tenant_filter(Some(Filter::eq("noticeTitle", "hello"))))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    })
    .await;

    let other = context::run(TenantScope::new("t2"), async {
        raw.model("SysNotice")
            .find_many(add_tenant_filter(Some(Filter::eq("noticeTitle", "hello"))))
            .await
            .unwrap()
    })
    .await;
    assert!(other.is_empty());
}

#[tokio::test]
async fn scoped_entity_outside_scope_is_forwarded_unfiltered() {
    let store = fixture();
    assert!(!context::is_active());
    let rows = store.model("SysUser").find_many(None).await.unwrap();
    assert_eq!(rows.len(), 4);
}

#[tokio::test]
async fn disabled_middleware_forwards_everything() {
    let store = MemoryStore::new();
    store.seed("SysRole", [rec(json!({"roleKey": "admin", "tenantId": "t2"}))]);
    let store = TenantIsolation::new(store).with_enabled(false);
    let rows = context::run(TenantScope::new("t1"), async {
        store.model("SysRole").find_many(None).await.unwrap()
    })
    .await;
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn explicit_scope_threading_matches_ambient_behaviour() {
    let store = fixture();
    let scope = TenantScope::new("t2");
    let out = store
        .execute_in(
            Some(&scope),
            "SysUser",
            tenancy_db::Operation::Count { filter: None },
        )
        .await
        .unwrap();
    assert_eq!(out, tenancy_db::Outcome::Count(2));

    // trait object dispatch keeps the middleware in place
    let dyn_store: Arc<dyn DataStore> = store;
    let n = context::run(scope, async { dyn_store.model("SysUser").count(None).await.unwrap() }).await;
    assert_eq!(n, 2);
}
