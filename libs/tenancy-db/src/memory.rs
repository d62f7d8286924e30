//! In-memory [`DataStore`] backend.
//!
//! Tables are vectors of JSON records keyed by entity name. Rows get a
//! numeric `id` when the payload has none. Used by tests and the demo
//! server; it applies filters exactly as written and knows nothing about
//! tenants.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Number, Value};

use crate::filter::{FieldFilter, FieldOp, Filter};
use crate::operation::{AggregateFn, Group, Operation, Outcome, Record};
use crate::store::{DataStore, StoreError};

/// Primary key column.
pub const ID_FIELD: &str = "id";

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Record>>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert rows verbatim, bypassing every middleware.
    pub fn seed(&self, entity: &str, rows: impl IntoIterator<Item = Record>) {
        let mut tables = self.tables.write();
        let table = tables.entry(entity.to_owned()).or_default();
        for row in rows {
            table.push(self.with_id(row));
        }
    }

    /// Copy of every row of `entity`, unfiltered.
    #[must_use]
    pub fn snapshot(&self, entity: &str) -> Vec<Record> {
        self.tables.read().get(entity).cloned().unwrap_or_default()
    }

    /// Assign the next id, or move the counter past a caller-supplied numeric id.
    fn with_id(&self, mut row: Record) -> Record {
        match row.get(ID_FIELD) {
            Some(given) => {
                if let Some(n) = given.as_u64() {
                    self.next_id.fetch_max(n, AtomicOrdering::Relaxed);
                }
            }
            None => {
                let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed) + 1;
                row.insert(ID_FIELD.to_owned(), Value::from(id));
            }
        }
        row
    }

    fn insert(&self, table: &mut Vec<Record>, entity: &str, data: Record) -> Result<Record, StoreError> {
        let row = self.with_id(data);
        if table.iter().any(|r| r.get(ID_FIELD) == row.get(ID_FIELD)) {
            return Err(duplicate_id(entity));
        }
        table.push(row.clone());
        Ok(row)
    }

    /// All or nothing: the batch is checked against the table and itself
    /// before any row is stored.
    fn insert_batch(&self, table: &mut Vec<Record>, entity: &str, data: Vec<Record>) -> Result<u64, StoreError> {
        let rows: Vec<Record> = data.into_iter().map(|r| self.with_id(r)).collect();
        for (i, row) in rows.iter().enumerate() {
            let id = row.get(ID_FIELD);
            let clash = table.iter().any(|r| r.get(ID_FIELD) == id)
                || rows[..i].iter().any(|r| r.get(ID_FIELD) == id);
            if clash {
                return Err(duplicate_id(entity));
            }
        }
        let n = rows.len() as u64;
        table.extend(rows);
        Ok(n)
    }

    fn read(&self, entity: &str, op: Operation) -> Result<Outcome, StoreError> {
        let tables = self.tables.read();
        let rows: &[Record] = tables.get(entity).map_or(&[], Vec::as_slice);

        let out = match op {
            Operation::FindMany { filter, take } => {
                let it = select(rows, filter.as_ref()).cloned();
                Outcome::Rows(match take {
                    Some(n) => it.take(n).collect(),
                    None => it.collect(),
                })
            }
            Operation::FindFirst { filter } => Outcome::Row(select(rows, filter.as_ref()).next().cloned()),
            Operation::FindUnique { filter } => Outcome::Row(select(rows, Some(&filter)).next().cloned()),
            Operation::Count { filter } => Outcome::Count(select(rows, filter.as_ref()).count() as u64),
            Operation::Aggregate { filter, func, field } => {
                let values: Vec<&Value> = select(rows, filter.as_ref())
                    .filter_map(|r| r.get(&field))
                    .filter(|v| !v.is_null())
                    .collect();
                Outcome::Value(aggregate(func, &values))
            }
            Operation::GroupBy { filter, by } => {
                let mut groups: Vec<Group> = Vec::new();
                for row in select(rows, filter.as_ref()) {
                    let key: Record = by
                        .iter()
                        .map(|f| (f.clone(), row.get(f).cloned().unwrap_or(Value::Null)))
                        .collect();
                    match groups.iter_mut().find(|g| g.key == key) {
                        Some(g) => g.count += 1,
                        None => groups.push(Group { key, count: 1 }),
                    }
                }
                Outcome::Groups(groups)
            }
            other => {
                return Err(StoreError::UnexpectedOutcome {
                    kind: other.kind(),
                    got: "write routed to read path",
                });
            }
        };
        Ok(out)
    }

    fn write(&self, entity: &str, op: Operation) -> Result<Outcome, StoreError> {
        let mut tables = self.tables.write();
        let table = tables.entry(entity.to_owned()).or_default();

        let out = match op {
            Operation::Create { data } => Outcome::Record(self.insert(table, entity, data)?),
            Operation::CreateMany { data } => Outcome::Count(self.insert_batch(table, entity, data)?),
            Operation::Update { filter, data } => {
                let row = table
                    .iter_mut()
                    .find(|r| matches(&filter, r))
                    .ok_or_else(|| StoreError::not_found(entity))?;
                merge(row, data);
                Outcome::Record(row.clone())
            }
            Operation::UpdateMany { filter, data } => {
                let mut n = 0u64;
                for row in table.iter_mut().filter(|r| matches_opt(filter.as_ref(), r)) {
                    merge(row, data.clone());
                    n += 1;
                }
                Outcome::Count(n)
            }
            Operation::Delete { filter } => {
                let pos = table
                    .iter()
                    .position(|r| matches(&filter, r))
                    .ok_or_else(|| StoreError::not_found(entity))?;
                Outcome::Record(table.remove(pos))
            }
            Operation::DeleteMany { filter } => {
                let before = table.len();
                table.retain(|r| !matches_opt(filter.as_ref(), r));
                Outcome::Count((before - table.len()) as u64)
            }
            Operation::Upsert {
                filter,
                create,
                update,
            } => match table.iter().position(|r| matches(&filter, r)) {
                Some(pos) => {
                    let row = &mut table[pos];
                    merge(row, update);
                    Outcome::Record(row.clone())
                }
                None => Outcome::Record(self.insert(table, entity, create)?),
            },
            other => {
                return Err(StoreError::UnexpectedOutcome {
                    kind: other.kind(),
                    got: "read routed to write path",
                });
            }
        };
        Ok(out)
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn execute(&self, entity: &str, op: Operation) -> Result<Outcome, StoreError> {
        match op {
            Operation::FindMany { .. }
            | Operation::FindFirst { .. }
            | Operation::FindUnique { .. }
            | Operation::Count { .. }
            | Operation::Aggregate { .. }
            | Operation::GroupBy { .. } => self.read(entity, op),
            _ => self.write(entity, op),
        }
    }
}

fn duplicate_id(entity: &str) -> StoreError {
    StoreError::Conflict {
        entity: entity.to_owned(),
        detail: format!("duplicate {ID_FIELD}"),
    }
}

fn merge(row: &mut Record, data: Record) {
    for (k, v) in data {
        if k != ID_FIELD {
            row.insert(k, v);
        }
    }
}

fn select<'a>(rows: &'a [Record], filter: Option<&'a Filter>) -> impl Iterator<Item = &'a Record> {
    rows.iter().filter(move |r| matches_opt(filter, r))
}

fn matches_opt(filter: Option<&Filter>, row: &Record) -> bool {
    filter.is_none_or(|f| matches(f, row))
}

/// Evaluate `filter` against `row`.
#[must_use]
pub fn matches(filter: &Filter, row: &Record) -> bool {
    match filter {
        Filter::Field(f) => matches_field(f, row),
        Filter::And(items) => items.iter().all(|f| matches(f, row)),
        Filter::Or(items) => items.iter().any(|f| matches(f, row)),
        Filter::Not(inner) => !matches(inner, row),
    }
}

fn matches_field(f: &FieldFilter, row: &Record) -> bool {
    let actual = row.get(f.field()).unwrap_or(&Value::Null);
    let expected = f.value();
    match f.op() {
        FieldOp::Eq => actual == expected,
        FieldOp::Ne => actual != expected,
        FieldOp::In => expected
            .as_array()
            .is_some_and(|items| items.iter().any(|v| v == actual)),
        FieldOp::Contains => match (actual.as_str(), expected.as_str()) {
            (Some(a), Some(e)) => a.contains(e),
            _ => false,
        },
        FieldOp::Gt => compare(actual, expected) == Some(Ordering::Greater),
        FieldOp::Gte => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        FieldOp::Lt => compare(actual, expected) == Some(Ordering::Less),
        FieldOp::Lte => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn aggregate(func: AggregateFn, values: &[&Value]) -> Value {
    let nums: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
    let out = match func {
        AggregateFn::Count => return Value::from(values.len() as u64),
        _ if nums.is_empty() => return Value::Null,
        AggregateFn::Sum => nums.iter().sum(),
        AggregateFn::Avg => nums.iter().sum::<f64>() / nums.len() as f64,
        AggregateFn::Min => nums.iter().copied().fold(f64::INFINITY, f64::min),
        AggregateFn::Max => nums.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };
    Number::from_f64(out).map_or(Value::Null, Value::Number)
}
