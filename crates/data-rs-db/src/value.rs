//! Value types for representing column data in a backend-agnostic way.
//!
//! The [`Value`] enum is used for constants, parameter values, and the cells
//! of an in-memory [`DataSet`](crate::dataset::DataSet). Each non-null
//! variant corresponds to exactly one [`ValueType`].

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::column::ValueType;

/// A backend-agnostic representation of a column value.
///
/// # Examples
///
/// ```
/// use data_rs_db::value::Value;
///
/// let v = Value::from(42_i32);
/// assert_eq!(v, Value::Int32(42));
///
/// let v = Value::from("hello");
/// assert_eq!(v, Value::String("hello".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// SQL NULL.
    Null,
    /// A boolean value.
    Bool(bool),
    /// An unsigned 8-bit integer.
    Byte(u8),
    /// A 16-bit signed integer.
    Int16(i16),
    /// A 32-bit signed integer.
    Int32(i32),
    /// A 64-bit signed integer.
    Int64(i64),
    /// A 32-bit floating-point number.
    Single(f32),
    /// A 64-bit floating-point number.
    Double(f64),
    /// A fixed-point decimal.
    Decimal(Decimal),
    /// A single character.
    Char(char),
    /// A UTF-8 string.
    String(String),
    /// Raw binary data.
    Bytes(Vec<u8>),
    /// A date without time.
    Date(NaiveDate),
    /// A time of day.
    Time(NaiveTime),
    /// A date and time without offset.
    DateTime(NaiveDateTime),
    /// A date and time with a UTC offset.
    DateTimeOffset(DateTime<FixedOffset>),
    /// A GUID.
    Guid(Uuid),
}

impl Value {
    /// Returns `true` if this is [`Value::Null`].
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value as an `i64` if it is one of the integral variants.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Byte(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the natural logical type of this value, or `None` for NULL.
    pub const fn value_type(&self) -> Option<ValueType> {
        Some(match self {
            Self::Null => return None,
            Self::Bool(_) => ValueType::Boolean,
            Self::Byte(_) => ValueType::Byte,
            Self::Int16(_) => ValueType::Int16,
            Self::Int32(_) => ValueType::Int32,
            Self::Int64(_) => ValueType::Int64,
            Self::Single(_) => ValueType::Single,
            Self::Double(_) => ValueType::Double,
            Self::Decimal(_) => ValueType::Decimal,
            Self::Char(_) => ValueType::Char,
            Self::String(_) => ValueType::String,
            Self::Bytes(_) => ValueType::Binary,
            Self::Date(_) => ValueType::Date,
            Self::Time(_) => ValueType::Time,
            Self::DateTime(_) => ValueType::DateTime,
            Self::DateTimeOffset(_) => ValueType::DateTimeOffset,
            Self::Guid(_) => ValueType::Guid,
        })
    }

    /// Builds an integral value of the given type from an `i64`.
    ///
    /// Returns `None` when `value_type` is not integral or the value does not
    /// fit.
    pub fn integral(value_type: &ValueType, value: i64) -> Option<Self> {
        match value_type {
            ValueType::Byte => u8::try_from(value).ok().map(Self::Byte),
            ValueType::Int16 => i16::try_from(value).ok().map(Self::Int16),
            ValueType::Int32 => i32::try_from(value).ok().map(Self::Int32),
            ValueType::Int64 => Some(Self::Int64(value)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Single(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Char(c) => write!(f, "{c}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Date(d) => write!(f, "{d}"),
            Self::Time(t) => write!(f, "{t}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
            Self::DateTimeOffset(dt) => write!(f, "{dt}"),
            Self::Guid(u) => write!(f, "{u}"),
        }
    }
}

// ── From implementations ───────────────────────────────────────────────

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    u8 => Byte,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Single,
    f64 => Double,
    Decimal => Decimal,
    char => Char,
    String => String,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    Uuid => Guid,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Self::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_primitives() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(7_u8), Value::Byte(7));
        assert_eq!(Value::from(7_i64), Value::Int64(7));
        assert_eq!(Value::from('x'), Value::Char('x'));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3_i16)), Value::Int16(3));
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(Value::Int16(-4).as_i64(), Some(-4));
        assert_eq!(Value::Byte(255).as_i64(), Some(255));
        assert_eq!(Value::String("1".into()).as_i64(), None);
        assert_eq!(Value::Null.as_i64(), None);
    }

    #[test]
    fn test_value_type() {
        assert_eq!(Value::Null.value_type(), None);
        assert_eq!(Value::from(1.5_f64).value_type(), Some(ValueType::Double));
        assert_eq!(Value::from(Uuid::nil()).value_type(), Some(ValueType::Guid));
    }

    #[test]
    fn test_integral() {
        assert_eq!(Value::integral(&ValueType::Int32, 101), Some(Value::Int32(101)));
        assert_eq!(Value::integral(&ValueType::Byte, 300), None);
        assert_eq!(Value::integral(&ValueType::String, 1), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Bytes(vec![1, 2, 3]).to_string(), "<3 bytes>");
        assert_eq!(Value::from("abc").to_string(), "abc");
    }
}
