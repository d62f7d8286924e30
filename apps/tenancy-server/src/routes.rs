//! Demo back-office endpoints on top of the isolated store.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tenancy_db::{DataStoreExt, Filter, MemoryStore, Record, StoreError, TenantIsolation};
use tenant_gateway::{ControllerPolicy, IsolationPolicy, OperationPolicy, PolicyError};

pub type Store = Arc<TenantIsolation<MemoryStore>>;

pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::Conflict { .. } => StatusCode::CONFLICT,
            StoreError::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            StoreError::UnexpectedOutcome { .. } | StoreError::Backend(_) => {
                tracing::error!(error = %self.0, "store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    status: Option<String>,
    user_name: Option<String>,
}

impl UserQuery {
    fn filter(&self) -> Option<Filter> {
        let mut parts = Vec::new();
        if let Some(status) = &self.status {
            parts.push(Filter::eq("status", status.as_str()));
        }
        if let Some(name) = &self.user_name {
            parts.push(Filter::field("userName", tenancy_db::FieldOp::Contains, name.as_str()));
        }
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Filter::and(parts)),
        }
    }
}

async fn list_users(
    State(store): State<Store>,
    Query(q): Query<UserQuery>,
) -> Result<Json<Vec<Record>>, ApiError> {
    Ok(Json(store.model("SysUser").find_many(q.filter()).await?))
}

async fn count_users(
    State(store): State<Store>,
    Query(q): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let total = store.model("SysUser").count(q.filter()).await?;
    Ok(Json(json!({ "total": total })))
}

async fn create_user(
    State(store): State<Store>,
    Json(data): Json<Record>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    if !data.get("userName").is_some_and(serde_json::Value::is_string) {
        return Err(StoreError::InvalidPayload {
            entity: "SysUser".to_owned(),
            detail: "userName is required".to_owned(),
        }
        .into());
    }
    let row = store.model("SysUser").create(data).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn update_user(
    State(store): State<Store>,
    Path(id): Path<u64>,
    Json(data): Json<Record>,
) -> Result<Json<Record>, ApiError> {
    Ok(Json(store.model("SysUser").update(Filter::eq("id", id), data).await?))
}

/// Bulk delete rather than a point delete, so the tenant filter applies.
async fn delete_user(
    State(store): State<Store>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let n = store
        .model("SysUser")
        .delete_many(Some(Filter::eq("id", id)))
        .await?;
    if n == 0 {
        return Err(StoreError::not_found("SysUser").into());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tenants(State(store): State<Store>) -> Result<Json<Vec<Record>>, ApiError> {
    Ok(Json(store.model("SysTenant").find_many(None).await?))
}

/// Per-tenant user counts; platform view, exempt from isolation.
async fn tenant_user_stats(
    State(store): State<Store>,
) -> Result<Json<Vec<tenancy_db::Group>>, ApiError> {
    Ok(Json(
        store
            .model("SysUser")
            .group_by(None, &[tenancy_db::TENANT_FIELD])
            .await?,
    ))
}

async fn health() -> &'static str {
    "ok"
}

pub fn router(store: Store) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/system/user/list", get(list_users))
        .route("/system/user/count", get(count_users))
        .route("/system/user", post(create_user))
        .route("/system/user/{id}", put(update_user).delete(delete_user))
        .route("/system/tenant/list", get(list_tenants))
        .route("/system/tenant/user-stats", get(tenant_user_stats))
        .with_state(store)
}

/// Isolation opt-outs for the routes above.
pub fn isolation_policy() -> Result<IsolationPolicy, PolicyError> {
    IsolationPolicy::build(
        [ControllerPolicy::new("/system/tenant").ignore_isolation(true)],
        [OperationPolicy::new(Method::GET, "/system/tenant/list").ignore_isolation(false)],
    )
}

fn rec(value: serde_json::Value) -> Record {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Two tenants with a few users each.
pub fn seed_demo(store: &MemoryStore) {
    store.seed(
        "SysTenant",
        [
            rec(json!({"tenantId": "000000", "companyName": "Platform"})),
            rec(json!({"tenantId": "100001", "companyName": "Acme"})),
            rec(json!({"tenantId": "100002", "companyName": "Globex"})),
        ],
    );
    store.seed(
        "SysUser",
        [
            rec(json!({"userName": "admin", "status": "0", "tenantId": "000000"})),
            rec(json!({"userName": "wile", "status": "0", "tenantId": "100001"})),
            rec(json!({"userName": "roadrunner", "status": "1", "tenantId": "100001"})),
            rec(json!({"userName": "hank", "status": "0", "tenantId": "100002"})),
        ],
    );
}
