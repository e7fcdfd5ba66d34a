//! Result rows returned by the execution contract.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use data_rs_core::{DataError, DataResult};
use data_rs_db::{Value, ValueType};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::codec::{decode, NativeValue};

/// A single result row: column names plus native values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<NativeValue>,
}

impl Row {
    /// Creates a new row from column names and values.
    ///
    /// # Panics
    ///
    /// Panics if the number of columns does not match the number of values.
    pub fn new(columns: Vec<String>, values: Vec<NativeValue>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "Row column count must match value count"
        );
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the raw value of the named column.
    pub fn native(&self, column: &str) -> Option<&NativeValue> {
        self.position(column).map(|idx| &self.values[idx])
    }

    /// Returns the raw value at `idx`.
    pub fn native_at(&self, idx: usize) -> Option<&NativeValue> {
        self.values.get(idx)
    }

    /// Gets a typed value by column name.
    pub fn get<T: FromNative>(&self, column: &str) -> DataResult<T> {
        let idx = self.position(column).ok_or_else(|| {
            DataError::DatabaseError(format!("Column '{column}' not found in row"))
        })?;
        T::from_native(&self.values[idx])
    }

    /// Gets a typed value by column index.
    pub fn get_by_index<T: FromNative>(&self, idx: usize) -> DataResult<T> {
        let value = self.values.get(idx).ok_or_else(|| {
            DataError::DatabaseError(format!(
                "Column index {idx} out of bounds (row has {} columns)",
                self.values.len()
            ))
        })?;
        T::from_native(value)
    }

    /// Decodes the value at `idx` into a logical value of `value_type`.
    pub fn decode(&self, idx: usize, value_type: &ValueType) -> DataResult<Value> {
        let native = self.native_at(idx).ok_or_else(|| {
            DataError::DatabaseError(format!("Column index {idx} out of bounds"))
        })?;
        decode(value_type, native)
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// Conversion from a [`NativeValue`] to a concrete Rust type.
pub trait FromNative: Sized {
    fn from_native(value: &NativeValue) -> DataResult<Self>;
}

fn mismatch(expected: &str, value: &NativeValue) -> DataError {
    DataError::DatabaseError(format!("Expected {expected}, got {value:?}"))
}

impl FromNative for i64 {
    fn from_native(value: &NativeValue) -> DataResult<Self> {
        value.as_i64().ok_or_else(|| mismatch("integer", value))
    }
}

impl FromNative for i32 {
    fn from_native(value: &NativeValue) -> DataResult<Self> {
        let v = i64::from_native(value)?;
        Self::try_from(v).map_err(|e| {
            DataError::DatabaseError(format!("Integer value out of i32 range: {e}"))
        })
    }
}

impl FromNative for f64 {
    fn from_native(value: &NativeValue) -> DataResult<Self> {
        match value {
            NativeValue::F64(f) => Ok(*f),
            NativeValue::F32(f) => Ok(Self::from(*f)),
            _ => Err(mismatch("float", value)),
        }
    }
}

macro_rules! impl_from_native {
    ($($ty:ty => $variant:ident, $label:literal;)*) => {
        $(
            impl FromNative for $ty {
                fn from_native(value: &NativeValue) -> DataResult<Self> {
                    match value {
                        NativeValue::$variant(v) => Ok(v.clone()),
                        _ => Err(mismatch($label, value)),
                    }
                }
            }
        )*
    };
}

impl_from_native! {
    bool => Bool, "Bool";
    Decimal => Decimal, "Decimal";
    String => String, "String";
    Vec<u8> => Bytes, "Bytes";
    NaiveDate => Date, "Date";
    NaiveTime => Time, "Time";
    NaiveDateTime => DateTime, "DateTime";
    DateTime<FixedOffset> => DateTimeOffset, "DateTimeOffset";
    Uuid => Guid, "Guid";
}

impl FromNative for NativeValue {
    fn from_native(value: &NativeValue) -> DataResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromNative> FromNative for Option<T> {
    fn from_native(value: &NativeValue) -> DataResult<Self> {
        match value {
            NativeValue::DbNull => Ok(None),
            _ => T::from_native(value).map(Some),
        }
    }
}
