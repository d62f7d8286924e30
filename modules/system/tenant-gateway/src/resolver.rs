//! Inbound tenant resolution.
//!
//! [`tenant_context_middleware`] picks the tenant for a request and runs the
//! rest of the pipeline (policy gate, handler and every response future)
//! inside a [`context::run`] scope.
//!
//! The scope ends when `next.run` returns. A streamed body (`Body::from_stream`,
//! SSE) is polled by hyper afterwards, so it must load its data before the
//! handler returns or carry the scope itself via [`context::propagate`].

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, HeaderName, StatusCode, Uri};
use tenancy_security::{TenantId, TenantIdError, TenantScope, context};

use crate::config::{ConfigError, TenancyConfig};

/// Where a resolved tenant id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantSource {
    Header,
    Query,
    /// Neither source supplied a value.
    Fallback,
}

/// A source carried a non-blank tenant id that failed validation.
///
/// Never downgraded to the fallback tenant: the request is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed tenant id in {origin:?}: {reason}")]
pub struct MalformedTenant {
    pub origin: TenantSource,
    pub reason: TenantIdError,
}

#[derive(Debug, Clone)]
pub struct TenantResolver {
    header_name: HeaderName,
    query_param: String,
    resolve_subdomain: bool,
    fallback: TenantId,
}

impl TenantResolver {
    /// # Errors
    /// Header or query parameter names that fail validation.
    pub fn from_config(cfg: &TenancyConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let header_name = HeaderName::from_bytes(cfg.header_name.as_bytes())
            .map_err(|_| ConfigError::InvalidHeaderName(cfg.header_name.clone()))?;
        Ok(Self {
            header_name,
            query_param: cfg.query_param.clone(),
            resolve_subdomain: cfg.resolve_subdomain,
            fallback: TenantId::super_tenant(),
        })
    }

    /// Tenant used when a request names none. Defaults to the super tenant.
    #[must_use]
    pub fn with_fallback(mut self, fallback: TenantId) -> Self {
        self.fallback = fallback;
        self
    }

    /// Header first, then query, then the fallback. Only absent or blank
    /// values fall through to the next source.
    ///
    /// # Errors
    /// [`MalformedTenant`] when the first non-blank value fails
    /// [`TenantId::parse`].
    pub fn resolve(&self, headers: &HeaderMap, uri: &Uri) -> Result<(TenantId, TenantSource), MalformedTenant> {
        if let Some(id) = self.header_tenant(headers)? {
            return Ok((id, TenantSource::Header));
        }
        if let Some(id) = self.query_tenant(uri)? {
            return Ok((id, TenantSource::Query));
        }
        if self.resolve_subdomain {
            tracing::debug!("subdomain tenant resolution is not implemented; skipping");
        }
        Ok((self.fallback.clone(), TenantSource::Fallback))
    }

    fn header_tenant(&self, headers: &HeaderMap) -> Result<Option<TenantId>, MalformedTenant> {
        let Some(value) = headers.get(&self.header_name) else {
            return Ok(None);
        };
        // non-ASCII bytes survive as U+FFFD and fail the charset check
        let raw = String::from_utf8_lossy(value.as_bytes());
        parse_candidate(&raw, TenantSource::Header)
    }

    fn query_tenant(&self, uri: &Uri) -> Result<Option<TenantId>, MalformedTenant> {
        let Some(query) = uri.query() else {
            return Ok(None);
        };
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap_or_default();
        match pairs.into_iter().find(|(k, _)| *k == self.query_param) {
            Some((_, v)) => parse_candidate(&v, TenantSource::Query),
            None => Ok(None),
        }
    }
}

fn parse_candidate(raw: &str, origin: TenantSource) -> Result<Option<TenantId>, MalformedTenant> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    TenantId::parse(raw)
        .map(Some)
        .map_err(|reason| MalformedTenant { origin, reason })
}

/// Open the ambient tenant scope for the remainder of the request.
///
/// Requests with a malformed tenant id get `400 Bad Request` and never reach
/// the handler.
#[tracing::instrument(level = "debug", skip_all, fields(method = %req.method(), path = %req.uri().path()))]
pub async fn tenant_context_middleware(
    State(resolver): State<Arc<TenantResolver>>,
    req: Request,
    next: Next,
) -> Response {
    let (tenant, source) = match resolver.resolve(req.headers(), req.uri()) {
        Ok(resolved) => resolved,
        Err(err) => {
            tracing::warn!(error = %err, "rejecting request with malformed tenant id");
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };
    tracing::debug!(tenant_id = %tenant, ?source, "tenant resolved");
    context::run(TenantScope::new(tenant), next.run(req)).await
}
