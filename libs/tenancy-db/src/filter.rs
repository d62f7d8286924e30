//! Structured where-clauses.
//!
//! A [`Filter`] is an immutable boolean tree of field predicates. The only
//! rewrite the isolation layer ever performs on a caller's filter is
//! [`Filter::conjoin`]: the tenant predicate is AND-ed on top, so an OR at
//! the root of the caller's tree can never route around it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tenancy_security::TenantId;

use crate::TENANT_FIELD;

/// Comparison applied by a field predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldOp {
    Eq,
    Ne,
    /// `value` is an array; matches when the field equals any element.
    In,
    /// Substring match on string fields.
    Contains,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A single predicate on a named field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    field: String,
    op: FieldOp,
    value: Value,
}

impl FieldFilter {
    #[must_use]
    pub fn new(field: impl Into<String>, op: FieldOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[inline]
    #[must_use]
    pub fn op(&self) -> FieldOp {
        self.op
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Boolean filter tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    Field(FieldFilter),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// `field == value`
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Field(FieldFilter::new(field, FieldOp::Eq, value))
    }

    #[must_use]
    pub fn field(field: impl Into<String>, op: FieldOp, value: impl Into<Value>) -> Self {
        Self::Field(FieldFilter::new(field, op, value))
    }

    #[must_use]
    pub fn and(items: Vec<Filter>) -> Self {
        Self::And(items)
    }

    #[must_use]
    pub fn or(items: Vec<Filter>) -> Self {
        Self::Or(items)
    }

    #[must_use]
    pub fn negate(inner: Filter) -> Self {
        Self::Not(Box::new(inner))
    }

    /// The `tenantId == tenant` leaf.
    #[must_use]
    pub fn tenant_leaf(tenant: &TenantId) -> Self {
        Self::eq(TENANT_FIELD, tenant.as_str())
    }

    /// An AND-list with no members matches everything and counts as empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::And(items) if items.is_empty())
    }

    /// Merge `leaf` into `filter` by conjunction.
    ///
    /// | `filter` | result |
    /// |----------|--------|
    /// | absent or empty AND | `leaf` |
    /// | `And([..])` | `And([.., leaf])` |
    /// | `Or`, `Not` or a field leaf | `And([leaf, filter])` |
    #[must_use]
    pub fn conjoin(filter: Option<Filter>, leaf: Filter) -> Filter {
        match filter {
            None => leaf,
            Some(f) if f.is_empty() => leaf,
            Some(Self::And(mut items)) => {
                items.push(leaf);
                Self::And(items)
            }
            Some(other) => Self::And(vec![leaf, other]),
        }
    }

    /// [`Filter::conjoin`] with the tenant leaf for `tenant`.
    #[must_use]
    pub fn and_tenant(filter: Option<Filter>, tenant: &TenantId) -> Filter {
        Self::conjoin(filter, Self::tenant_leaf(tenant))
    }
}

impl From<FieldFilter> for Filter {
    fn from(value: FieldFilter) -> Self {
        Self::Field(value)
    }
}
