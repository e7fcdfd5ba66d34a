//! In-memory typed rows of one model.
//!
//! A [`DataSet`] hands out provisional identity values (`seed`, `seed +
//! increment`, ...) to new rows so that child rows can reference a parent
//! before it is inserted. After a bulk insert the real keys are written back
//! with bookkeeping suspended and each row's primary key is sealed.

use std::collections::HashMap;
use std::sync::Arc;

use data_rs_core::{DataError, DataResult};

use crate::column::{Column, Identity};
use crate::model::Model;
use crate::value::Value;

/// One row: values in column order plus the sealed flag.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    values: Vec<Value>,
    pk_sealed: bool,
}

impl DataRow {
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, ordinal: usize) -> Option<&Value> {
        self.values.get(ordinal)
    }

    pub const fn is_pk_sealed(&self) -> bool {
        self.pk_sealed
    }
}

#[derive(Debug, Clone)]
struct IdentityTracker {
    ordinal: usize,
    spec: Identity,
    next: i64,
}

impl IdentityTracker {
    /// Moves `next` past `value` in the direction of the increment.
    fn observe(&mut self, value: i64) {
        let inc = self.spec.increment;
        if (inc > 0 && value >= self.next) || (inc < 0 && value <= self.next) {
            self.next = value.saturating_add(inc);
        }
    }
}

/// Rows of one model.
#[derive(Debug, Clone)]
pub struct DataSet {
    model: Arc<Model>,
    rows: Vec<DataRow>,
    identity: Option<IdentityTracker>,
    suspended: bool,
}

impl DataSet {
    /// Creates an empty data set; identity bookkeeping starts at the model's
    /// identity seed.
    pub fn new(model: &Arc<Model>) -> Self {
        let identity = model.columns.iter().enumerate().find_map(|(ordinal, c)| {
            c.identity.map(|spec| IdentityTracker {
                ordinal,
                spec,
                next: spec.seed,
            })
        });
        Self {
            model: Arc::clone(model),
            rows: Vec::new(),
            identity,
            suspended: false,
        }
    }

    pub const fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns `true` while identity bookkeeping is suspended.
    pub const fn is_identity_suspended(&self) -> bool {
        self.suspended
    }

    /// Appends a row of NULLs, assigning the next provisional identity.
    /// Returns the row index.
    pub fn add_row(&mut self) -> DataResult<usize> {
        let mut values = vec![Value::Null; self.model.columns.len()];
        if let Some(tracker) = self.identity.as_mut().filter(|_| !self.suspended) {
            let column = &self.model.columns[tracker.ordinal];
            values[tracker.ordinal] = Value::integral(&column.value_type, tracker.next)
                .ok_or_else(|| {
                    DataError::ArgumentOutOfRange(format!(
                        "identity value {} does not fit column '{}' of type {}",
                        tracker.next, column.name, column.value_type
                    ))
                })?;
            tracker.next = tracker.next.saturating_add(tracker.spec.increment);
        }
        self.rows.push(DataRow {
            values,
            pk_sealed: false,
        });
        Ok(self.rows.len() - 1)
    }

    /// Appends a row and fills the given column values.
    pub fn add_row_with(&mut self, values: Vec<(&Arc<Column>, Value)>) -> DataResult<usize> {
        let row = self.add_row()?;
        for (column, value) in values {
            self.set_value(row, column, value)?;
        }
        Ok(row)
    }

    pub fn value(&self, row: usize, column: &Column) -> Option<&Value> {
        let ordinal = self.model.ordinal_of(column)?;
        self.rows.get(row)?.values.get(ordinal)
    }

    /// Writes one cell.
    ///
    /// Writing the identity column outside suspension advances the
    /// provisional counter past the written value. Primary-key columns of a
    /// sealed row reject writes.
    pub fn set_value(&mut self, row: usize, column: &Column, value: Value) -> DataResult<()> {
        let ordinal = self.model.ordinal_of(column).ok_or_else(|| {
            DataError::InvalidStatement(format!(
                "column '{}' does not belong to model '{}'",
                column.name, self.model.name
            ))
        })?;
        let len = self.rows.len();
        let data_row = self.rows.get_mut(row).ok_or_else(|| {
            DataError::ArgumentOutOfRange(format!(
                "row {row} of data set '{}' (len {len})",
                self.model.name
            ))
        })?;
        if data_row.pk_sealed && self.model.is_primary_key_column(column) {
            return Err(DataError::InvalidStatement(format!(
                "primary key column '{}' of row {row} is sealed",
                column.name
            )));
        }
        if let Some(tracker) = self.identity.as_mut() {
            if tracker.ordinal == ordinal && !self.suspended {
                if let Some(v) = value.as_i64() {
                    tracker.observe(v);
                }
            }
        }
        data_row.values[ordinal] = value;
        Ok(())
    }

    /// Runs `f` with identity bookkeeping suspended.
    pub fn with_identity_suspended<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.suspended;
        self.suspended = true;
        let result = f(self);
        self.suspended = previous;
        result
    }

    /// Marks a row's primary key as final.
    pub fn seal_primary_key(&mut self, row: usize) -> DataResult<()> {
        let len = self.rows.len();
        let data_row = self.rows.get_mut(row).ok_or_else(|| {
            DataError::ArgumentOutOfRange(format!("row {row} of data set (len {len})"))
        })?;
        data_row.pk_sealed = true;
        Ok(())
    }

    /// Finds the row whose identity column holds `value`.
    pub fn find_by_identity(&self, value: i64) -> Option<usize> {
        let ordinal = self.identity.as_ref()?.ordinal;
        self.rows
            .iter()
            .position(|r| r.values[ordinal].as_i64() == Some(value))
    }

    /// Rewrites `column` in every row through `mapping` (old → new).
    /// Each row is remapped at most once. Returns the number of rows changed.
    pub fn remap_column(&mut self, column: &Column, mapping: &HashMap<i64, Value>) -> DataResult<usize> {
        let ordinal = self.model.ordinal_of(column).ok_or_else(|| {
            DataError::InvalidStatement(format!(
                "column '{}' does not belong to model '{}'",
                column.name, self.model.name
            ))
        })?;
        let mut changed = 0;
        for row in &mut self.rows {
            let Some(new_value) = row.values[ordinal].as_i64().and_then(|old| mapping.get(&old))
            else {
                continue;
            };
            row.values[ordinal] = new_value.clone();
            changed += 1;
        }
        Ok(changed)
    }
}
