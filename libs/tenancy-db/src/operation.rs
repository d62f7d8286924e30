use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::filter::Filter;

/// A row or a create/update payload: field name to JSON value.
pub type Record = Map<String, Value>;

/// Aggregate function for [`Operation::Aggregate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// One call into the data-access layer. Each variant is a named hook that
/// middleware such as the tenant interceptor can rewrite.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Operation {
    FindMany {
        filter: Option<Filter>,
        #[serde(default)]
        take: Option<usize>,
    },
    FindFirst {
        filter: Option<Filter>,
    },
    /// Point lookup by unique key.
    FindUnique {
        filter: Filter,
    },
    Count {
        filter: Option<Filter>,
    },
    Aggregate {
        filter: Option<Filter>,
        func: AggregateFn,
        field: String,
    },
    GroupBy {
        filter: Option<Filter>,
        by: Vec<String>,
    },
    Create {
        data: Record,
    },
    CreateMany {
        data: Vec<Record>,
    },
    Update {
        filter: Filter,
        data: Record,
    },
    UpdateMany {
        filter: Option<Filter>,
        data: Record,
    },
    /// Delete by unique key.
    Delete {
        filter: Filter,
    },
    DeleteMany {
        filter: Option<Filter>,
    },
    Upsert {
        filter: Filter,
        create: Record,
        update: Record,
    },
}

/// Discriminant of [`Operation`], for logging and dispatch tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    FindMany,
    FindFirst,
    FindUnique,
    Count,
    Aggregate,
    GroupBy,
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Delete,
    DeleteMany,
    Upsert,
}

impl OperationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FindMany => "findMany",
            Self::FindFirst => "findFirst",
            Self::FindUnique => "findUnique",
            Self::Count => "count",
            Self::Aggregate => "aggregate",
            Self::GroupBy => "groupBy",
            Self::Create => "create",
            Self::CreateMany => "createMany",
            Self::Update => "update",
            Self::UpdateMany => "updateMany",
            Self::Delete => "delete",
            Self::DeleteMany => "deleteMany",
            Self::Upsert => "upsert",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Operation {
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::FindMany { .. } => OperationKind::FindMany,
            Self::FindFirst { .. } => OperationKind::FindFirst,
            Self::FindUnique { .. } => OperationKind::FindUnique,
            Self::Count { .. } => OperationKind::Count,
            Self::Aggregate { .. } => OperationKind::Aggregate,
            Self::GroupBy { .. } => OperationKind::GroupBy,
            Self::Create { .. } => OperationKind::Create,
            Self::CreateMany { .. } => OperationKind::CreateMany,
            Self::Update { .. } => OperationKind::Update,
            Self::UpdateMany { .. } => OperationKind::UpdateMany,
            Self::Delete { .. } => OperationKind::Delete,
            Self::DeleteMany { .. } => OperationKind::DeleteMany,
            Self::Upsert { .. } => OperationKind::Upsert,
        }
    }
}

/// One bucket of a [`Operation::GroupBy`] result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub key: Record,
    pub count: u64,
}

/// Result of an [`Operation`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    /// `findMany`
    Rows(Vec<Record>),
    /// `findFirst`, `findUnique`
    Row(Option<Record>),
    /// `create`, `update`, `delete`, `upsert`: the affected row.
    Record(Record),
    /// `count` and the number of rows touched by batch writes.
    Count(u64),
    /// `aggregate`
    Value(Value),
    /// `groupBy`
    Groups(Vec<Group>),
}

impl Outcome {
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Rows(_) => "rows",
            Self::Row(_) => "row",
            Self::Record(_) => "record",
            Self::Count(_) => "count",
            Self::Value(_) => "value",
            Self::Groups(_) => "groups",
        }
    }
}
