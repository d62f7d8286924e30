use std::sync::Arc;

use async_trait::async_trait;

use crate::operation::{Operation, OperationKind, Outcome};

/// Errors surfaced by a [`DataStore`].
///
/// Tenant rewriting never produces one of these; they come from the backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} record not found")]
    NotFound { entity: String },

    #[error("{entity} record conflicts with an existing row: {detail}")]
    Conflict { entity: String, detail: String },

    #[error("invalid payload for {entity}: {detail}")]
    InvalidPayload { entity: String, detail: String },

    #[error("{kind} returned unexpected outcome `{got}`")]
    UnexpectedOutcome {
        kind: OperationKind,
        got: &'static str,
    },

    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn not_found(entity: &str) -> Self {
        Self::NotFound {
            entity: entity.to_owned(),
        }
    }
}

/// The generic data-access API.
///
/// Every CRUD and aggregate call goes through [`DataStore::execute`], which
/// lets middleware wrap a store and see (and rewrite) each operation.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Execute `op` against `entity`.
    ///
    /// # Errors
    ///
    /// Backend specific; see [`StoreError`].
    async fn execute(&self, entity: &str, op: Operation) -> Result<Outcome, StoreError>;
}

#[async_trait]
impl<T> DataStore for Arc<T>
where
    T: DataStore + ?Sized,
{
    async fn execute(&self, entity: &str, op: Operation) -> Result<Outcome, StoreError> {
        (**self).execute(entity, op).await
    }
}
