//! Per-route isolation opt-out.
//!
//! Controllers (path prefixes) and operations (method + route) may carry an
//! `ignore_isolation` marker. The operation marker wins over the controller
//! one; with neither the route keeps isolation.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::Method;
use tenancy_security::context;

/// Opt-out marker for every route under `prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerPolicy {
    pub prefix: String,
    pub ignore_isolation: Option<bool>,
}

impl ControllerPolicy {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ignore_isolation: None,
        }
    }

    #[must_use]
    pub fn ignore_isolation(mut self, ignore: bool) -> Self {
        self.ignore_isolation = Some(ignore);
        self
    }
}

/// Opt-out marker for one operation. `path` uses the axum 0.8 route syntax
/// (`/users/{id}`); legacy `:id` segments are still accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPolicy {
    pub method: Method,
    pub path: String,
    pub ignore_isolation: Option<bool>,
}

impl OperationPolicy {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ignore_isolation: None,
        }
    }

    #[must_use]
    pub fn ignore_isolation(mut self, ignore: bool) -> Self {
        self.ignore_isolation = Some(ignore);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid route pattern '{path}': {source}")]
    InvalidRoute {
        path: String,
        #[source]
        source: matchit::InsertError,
    },
}

/// Which declaration decided a route's isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySource {
    Operation,
    Controller,
    Default,
}

/// Operation markers for one HTTP method.
#[derive(Clone)]
struct RouteMatcher {
    matcher: matchit::Router<bool>,
}

impl RouteMatcher {
    fn new() -> Self {
        Self {
            matcher: matchit::Router::new(),
        }
    }

    fn insert(&mut self, path: &str, ignore: bool) -> Result<(), matchit::InsertError> {
        self.matcher.insert(path, ignore)
    }

    fn find(&self, path: &str) -> Option<bool> {
        self.matcher.at(path).ok().map(|m| *m.value)
    }
}

/// Rewrite legacy `:param` segments to `{param}`. Paths already in `{param}`
/// form pass through unchanged.
pub fn convert_axum_path_to_matchit(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == ':' {
            result.push('{');
            while matches!(chars.peek(), Some(c) if c.is_alphanumeric() || *c == '_') {
                if let Some(c) = chars.next() {
                    result.push(c);
                }
            }
            result.push('}');
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolved opt-out table consulted by [`policy_gate_middleware`].
#[derive(Clone, Default)]
pub struct IsolationPolicy {
    operations: Arc<HashMap<Method, RouteMatcher>>,
    /// Longest prefix first.
    controllers: Arc<Vec<(String, bool)>>,
}

impl IsolationPolicy {
    /// Build the lookup tables. Markers left as `None` are dropped so lookups
    /// fall through to the next level.
    ///
    /// # Errors
    /// An operation path matchit cannot parse, or a duplicate route.
    pub fn build(
        controllers: impl IntoIterator<Item = ControllerPolicy>,
        operations: impl IntoIterator<Item = OperationPolicy>,
    ) -> Result<Self, PolicyError> {
        let mut matchers: HashMap<Method, RouteMatcher> = HashMap::new();
        for op in operations {
            let Some(ignore) = op.ignore_isolation else {
                continue;
            };
            let matchit_path = convert_axum_path_to_matchit(&op.path);
            matchers
                .entry(op.method)
                .or_insert_with(RouteMatcher::new)
                .insert(&matchit_path, ignore)
                .map_err(|source| PolicyError::InvalidRoute {
                    path: op.path.clone(),
                    source,
                })?;
        }

        let mut prefixes: Vec<(String, bool)> = controllers
            .into_iter()
            .filter_map(|c| {
                let ignore = c.ignore_isolation?;
                Some((c.prefix.trim_end_matches('/').to_owned(), ignore))
            })
            .collect();
        prefixes.sort_by_key(|(prefix, _)| std::cmp::Reverse(prefix.len()));

        Ok(Self {
            operations: Arc::new(matchers),
            controllers: Arc::new(prefixes),
        })
    }

    /// Effective `ignore_isolation` for `(method, path)` and where it came from.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> (bool, PolicySource) {
        if let Some(ignore) = self.operations.get(method).and_then(|m| m.find(path)) {
            return (ignore, PolicySource::Operation);
        }
        let controller = self
            .controllers
            .iter()
            .find(|(prefix, _)| under_prefix(path, prefix));
        match controller {
            Some((_, ignore)) => (*ignore, PolicySource::Controller),
            None => (false, PolicySource::Default),
        }
    }

    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> bool {
        self.lookup(method, path).0
    }
}

fn under_prefix(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Flip the ambient ignore flag for opted-out routes. Must run inside the
/// scope opened by [`crate::tenant_context_middleware`].
pub async fn policy_gate_middleware(
    State(policy): State<IsolationPolicy>,
    req: Request,
    next: Next,
) -> Response {
    let (ignore, source) = policy.lookup(req.method(), req.uri().path());
    if ignore {
        if context::set_ignore_isolation(true) {
            tracing::debug!(
                method = %req.method(),
                path = %req.uri().path(),
                ?source,
                "tenant isolation disabled for route"
            );
        } else {
            tracing::warn!(
                method = %req.method(),
                path = %req.uri().path(),
                "isolation opt-out requested outside a tenant scope"
            );
        }
    }
    next.run(req).await
}
