//! Typed per-entity facade over [`DataStore`].
//!
//! ```ignore
//! let users = store.model("SysUser").find_many(Some(Filter::eq("status", "0"))).await?;
//! ```

use serde_json::Value;

use crate::filter::Filter;
use crate::operation::{AggregateFn, Group, Operation, Outcome, Record};
use crate::store::{DataStore, StoreError};

/// Operations on one entity type of a store.
pub struct Model<'a, S: ?Sized> {
    store: &'a S,
    entity: &'a str,
}

/// Adds [`DataStoreExt::model`] to every store.
pub trait DataStoreExt: DataStore {
    fn model<'a>(&'a self, entity: &'a str) -> Model<'a, Self> {
        Model {
            store: self,
            entity,
        }
    }
}

impl<S: DataStore + ?Sized> DataStoreExt for S {}

fn unexpected(op_kind: crate::OperationKind, got: &Outcome) -> StoreError {
    StoreError::UnexpectedOutcome {
        kind: op_kind,
        got: got.variant_name(),
    }
}

impl<S: DataStore + ?Sized> Model<'_, S> {
    #[must_use]
    pub fn entity(&self) -> &str {
        self.entity
    }

    async fn call(&self, op: Operation) -> Result<(crate::OperationKind, Outcome), StoreError> {
        let kind = op.kind();
        let out = self.store.execute(self.entity, op).await?;
        Ok((kind, out))
    }

    async fn expect_record(&self, op: Operation) -> Result<Record, StoreError> {
        match self.call(op).await? {
            (_, Outcome::Record(r)) => Ok(r),
            (kind, other) => Err(unexpected(kind, &other)),
        }
    }

    async fn expect_row(&self, op: Operation) -> Result<Option<Record>, StoreError> {
        match self.call(op).await? {
            (_, Outcome::Row(r)) => Ok(r),
            (kind, other) => Err(unexpected(kind, &other)),
        }
    }

    async fn expect_count(&self, op: Operation) -> Result<u64, StoreError> {
        match self.call(op).await? {
            (_, Outcome::Count(n)) => Ok(n),
            (kind, other) => Err(unexpected(kind, &other)),
        }
    }

    /// # Errors
    /// Propagates store errors.
    pub async fn find_many(&self, filter: Option<Filter>) -> Result<Vec<Record>, StoreError> {
        self.find_many_take(filter, None).await
    }

    /// # Errors
    /// Propagates store errors.
    pub async fn find_many_take(
        &self,
        filter: Option<Filter>,
        take: Option<usize>,
    ) -> Result<Vec<Record>, StoreError> {
        match self.call(Operation::FindMany { filter, take }).await? {
            (_, Outcome::Rows(rows)) => Ok(rows),
            (kind, other) => Err(unexpected(kind, &other)),
        }
    }

    /// # Errors
    /// Propagates store errors.
    pub async fn find_first(&self, filter: Option<Filter>) -> Result<Option<Record>, StoreError> {
        self.expect_row(Operation::FindFirst { filter }).await
    }

    /// # Errors
    /// Propagates store errors.
    pub async fn find_unique(&self, filter: Filter) -> Result<Option<Record>, StoreError> {
        self.expect_row(Operation::FindUnique { filter }).await
    }

    /// # Errors
    /// Propagates store errors.
    pub async fn count(&self, filter: Option<Filter>) -> Result<u64, StoreError> {
        self.expect_count(Operation::Count { filter }).await
    }

    /// # Errors
    /// Propagates store errors.
    pub async fn aggregate(
        &self,
        filter: Option<Filter>,
        func: AggregateFn,
        field: &str,
    ) -> Result<Value, StoreError> {
        let op = Operation::Aggregate {
            filter,
            func,
            field: field.to_owned(),
        };
        match self.call(op).await? {
            (_, Outcome::Value(v)) => Ok(v),
            (kind, other) => Err(unexpected(kind, &other)),
        }
    }

    /// # Errors
    /// Propagates store errors.
    pub async fn group_by(
        &self,
        filter: Option<Filter>,
        by: &[&str],
    ) -> Result<Vec<Group>, StoreError> {
        let op = Operation::GroupBy {
            filter,
            by: by.iter().map(|s| (*s).to_owned()).collect(),
        };
        match self.call(op).await? {
            (_, Outcome::Groups(g)) => Ok(g),
            (kind, other) => Err(unexpected(kind, &other)),
        }
    }

    /// # Errors
    /// Propagates store errors.
    pub async fn create(&self, data: Record) -> Result<Record, StoreError> {
        self.expect_record(Operation::Create { data }).await
    }

    /// # Errors
    /// Propagates store errors.
    pub async fn create_many(&self, data: Vec<Record>) -> Result<u64, StoreError> {
        self.expect_count(Operation::CreateMany { data }).await
    }

    /// # Errors
    /// Propagates store errors, including `NotFound` when nothing matches.
    pub async fn update(&self, filter: Filter, data: Record) -> Result<Record, StoreError> {
        self.expect_record(Operation::Update { filter, data }).await
    }

    /// # Errors
    /// Propagates store errors.
    pub async fn update_many(&self, filter: Option<Filter>, data: Record) -> Result<u64, StoreError> {
        self.expect_count(Operation::UpdateMany { filter, data }).await
    }

    /// # Errors
    /// Propagates store errors, including `NotFound` when nothing matches.
    pub async fn delete(&self, filter: Filter) -> Result<Record, StoreError> {
        self.expect_record(Operation::Delete { filter }).await
    }

    /// # Errors
    /// Propagates store errors.
    pub async fn delete_many(&self, filter: Option<Filter>) -> Result<u64, StoreError> {
        self.expect_count(Operation::DeleteMany { filter }).await
    }

    /// # Errors
    /// Propagates store errors.
    pub async fn upsert(
        &self,
        filter: Filter,
        create: Record,
        update: Record,
    ) -> Result<Record, StoreError> {
        self.expect_record(Operation::Upsert {
            filter,
            create,
            update,
        })
        .await
    }
}
