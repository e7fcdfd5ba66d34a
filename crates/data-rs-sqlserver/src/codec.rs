//! Literal and parameter codec.
//!
//! Renders typed [`Value`]s as T-SQL literals (for inline constants, DDL,
//! and debug SQL) and as [`NativeValue`]s for parameter binding; decodes
//! native values read from a row back into typed values; and parses literals
//! back, which closes the round trip
//! `parse_literal(render_literal(v)) == v`.
//!
//! Formats are culture invariant. Date/time literals carry exactly the
//! fractional digits of their target type.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use data_rs_core::{DataError, DataResult};
use data_rs_db::{EnumStorage, Value, ValueType};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::mapper::is_compatible;
use crate::sql_type::{SqlDbType, SqlType};

const DATE_FORMAT: &str = "%Y-%m-%d";
const SECONDS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A value as handed to (or read from) the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    DbNull,
    Bool(bool),
    U8(u8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Guid(Uuid),
}

impl NativeValue {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::DbNull)
    }

    /// Returns integral natives widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::U8(v) => Some(i64::from(*v)),
            Self::I16(v) => Some(i64::from(*v)),
            Self::I32(v) => Some(i64::from(*v)),
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }
}

// ── Quoting ────────────────────────────────────────────────────────────

/// Quotes an identifier as `[name]`, doubling embedded `]`.
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Quotes a string literal, doubling embedded `'`; `N'...'` when `unicode`.
pub fn quote_string(text: &str, unicode: bool) -> String {
    let prefix = if unicode { "N" } else { "" };
    format!("{prefix}'{}'", text.replace('\'', "''"))
}

// ── Rendering ──────────────────────────────────────────────────────────

/// Renders `value` as a literal of `sql_type`.
///
/// # Examples
///
/// ```
/// use data_rs_db::Value;
/// use data_rs_sqlserver::codec::render_literal;
/// use data_rs_sqlserver::sql_type::SqlType;
///
/// let nvarchar = SqlType::n_var_char(-1).unwrap();
/// assert_eq!(render_literal(&nvarchar, &Value::from("it's")).unwrap(), "N'it''s'");
/// assert_eq!(render_literal(&SqlType::float(), &Value::from(1.5_f64)).unwrap(), "1.5E0");
/// assert_eq!(render_literal(&SqlType::int(), &Value::Null).unwrap(), "NULL");
/// ```
pub fn render_literal(sql_type: &SqlType, value: &Value) -> DataResult<String> {
    ensure_storable(sql_type, value)?;
    let literal = match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Byte(v) => v.to_string(),
        Value::Int16(v) => v.to_string(),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::Single(v) => format_float(f64::from(*v), v.is_finite(), || format!("{v:E}"))?,
        Value::Double(v) => format_float(*v, v.is_finite(), || format!("{v:E}"))?,
        Value::Decimal(d) => d.to_string(),
        Value::Char(c) => quote_string(&c.to_string(), sql_type.is_unicode()),
        Value::String(s) => quote_string(s, sql_type.is_unicode()),
        Value::Bytes(bytes) => hex_literal(bytes),
        Value::Date(d) => format!("'{}'", d.format(DATE_FORMAT)),
        Value::Time(t) => format!("'{}'", format_time(*t, sql_type.fractional_digits())),
        Value::DateTime(dt) => format!("'{}'", format_date_time(*dt, sql_type)),
        Value::DateTimeOffset(dt) => {
            format!("'{}'", format_date_time_offset(*dt, sql_type.fractional_digits()))
        }
        Value::Guid(g) => format!("'{g}'"),
    };
    Ok(literal)
}

fn format_float(v: f64, finite: bool, render: impl FnOnce() -> String) -> DataResult<String> {
    if finite {
        Ok(render())
    } else {
        Err(DataError::ArgumentOutOfRange(format!(
            "floating point value {v} has no SQL literal"
        )))
    }
}

fn hex_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{b:02X}"));
    }
    out
}

/// `.fff…` with exactly `digits` digits, or nothing when `digits` is 0.
fn fraction(nanos: u32, digits: u8) -> String {
    if digits == 0 {
        return String::new();
    }
    let digits = u32::from(digits.min(9));
    let scaled = nanos.min(999_999_999) / 10_u32.pow(9 - digits);
    format!(".{scaled:0width$}", width = digits as usize)
}

pub(crate) fn format_time(t: NaiveTime, digits: u8) -> String {
    format!("{}{}", t.format("%H:%M:%S"), fraction(t.nanosecond(), digits))
}

fn format_date_time(dt: NaiveDateTime, sql_type: &SqlType) -> String {
    match sql_type.db_type() {
        SqlDbType::SmallDateTime => dt.format(SECONDS_FORMAT).to_string(),
        _ => format!(
            "{}{}",
            dt.format(SECONDS_FORMAT),
            fraction(dt.nanosecond(), sql_type.fractional_digits())
        ),
    }
}

pub(crate) fn format_date_time_offset(dt: DateTime<FixedOffset>, digits: u8) -> String {
    format!(
        "{}{} {}",
        dt.format(SECONDS_FORMAT),
        fraction(dt.nanosecond(), digits),
        dt.format("%:z")
    )
}

/// Fails unless `value` can be stored in `sql_type`. Integers may cross
/// integer widths; range is checked on conversion.
fn ensure_storable(sql_type: &SqlType, value: &Value) -> DataResult<()> {
    let Some(value_type) = value.value_type() else {
        return Ok(());
    };
    let db_type = sql_type.db_type();
    let ok = is_compatible(&value_type, db_type)
        || (value_type.is_integral() && db_type.is_integral())
        || (value_type == ValueType::String && db_type == SqlDbType::Xml)
        || db_type == SqlDbType::Udt;
    if ok {
        Ok(())
    } else {
        Err(DataError::NotSupported(format!(
            "{value_type} value for SQL type {}",
            sql_type.sql()
        )))
    }
}

// ── Native binding ─────────────────────────────────────────────────────

/// Converts `value` to the native representation bound for `sql_type`.
pub fn to_native(sql_type: &SqlType, value: &Value) -> DataResult<NativeValue> {
    ensure_storable(sql_type, value)?;
    if let (Some(v), true) = (value.as_i64(), sql_type.db_type().is_integral()) {
        return integral_native(sql_type.db_type(), v);
    }
    let native = match value {
        Value::Null => NativeValue::DbNull,
        Value::Bool(b) => NativeValue::Bool(*b),
        Value::Byte(v) => NativeValue::U8(*v),
        Value::Int16(v) => NativeValue::I16(*v),
        Value::Int32(v) => NativeValue::I32(*v),
        Value::Int64(v) => NativeValue::I64(*v),
        Value::Single(v) => NativeValue::F32(*v),
        Value::Double(v) => NativeValue::F64(*v),
        Value::Decimal(d) => NativeValue::Decimal(*d),
        Value::Char(c) => NativeValue::String(c.to_string()),
        Value::String(s) => NativeValue::String(s.clone()),
        Value::Bytes(b) => NativeValue::Bytes(b.clone()),
        Value::Date(d) => NativeValue::Date(*d),
        Value::Time(t) => NativeValue::Time(*t),
        Value::DateTime(dt) => NativeValue::DateTime(*dt),
        Value::DateTimeOffset(dt) => NativeValue::DateTimeOffset(*dt),
        Value::Guid(g) => NativeValue::Guid(*g),
    };
    Ok(native)
}

fn integral_native(db_type: SqlDbType, v: i64) -> DataResult<NativeValue> {
    let out_of_range =
        || DataError::ArgumentOutOfRange(format!("value {v} does not fit SQL type {db_type}"));
    Ok(match db_type {
        SqlDbType::TinyInt => NativeValue::U8(u8::try_from(v).map_err(|_| out_of_range())?),
        SqlDbType::SmallInt => NativeValue::I16(i16::try_from(v).map_err(|_| out_of_range())?),
        SqlDbType::Int => NativeValue::I32(i32::try_from(v).map_err(|_| out_of_range())?),
        _ => NativeValue::I64(v),
    })
}

// ── Decoding ───────────────────────────────────────────────────────────

/// Decodes a native value read from a row into a value of `value_type`.
pub fn decode(value_type: &ValueType, native: &NativeValue) -> DataResult<Value> {
    if native.is_null() {
        return Ok(Value::Null);
    }
    let mismatch = || {
        DataError::SerializationError(format!("cannot decode {native:?} as {value_type}"))
    };
    if value_type.is_integral() {
        let v = native.as_i64().ok_or_else(mismatch)?;
        return Value::integral(value_type, v).ok_or_else(mismatch);
    }
    let value = match (value_type, native) {
        (ValueType::Boolean, NativeValue::Bool(b)) => Value::Bool(*b),
        (ValueType::Single, NativeValue::F32(v)) => Value::Single(*v),
        (ValueType::Double, NativeValue::F64(v)) => Value::Double(*v),
        (ValueType::Double, NativeValue::F32(v)) => Value::Double(f64::from(*v)),
        (ValueType::Decimal, NativeValue::Decimal(d)) => Value::Decimal(*d),
        (ValueType::Char, NativeValue::String(s))
        | (
            ValueType::Enum {
                storage: EnumStorage::Char,
                ..
            },
            NativeValue::String(s),
        ) => Value::Char(single_char(s).ok_or_else(mismatch)?),
        (ValueType::String | ValueType::Xml, NativeValue::String(s)) => Value::String(s.clone()),
        (ValueType::Binary, NativeValue::Bytes(b)) => Value::Bytes(b.clone()),
        (ValueType::Date, NativeValue::Date(d)) => Value::Date(*d),
        (ValueType::Time, NativeValue::Time(t)) => Value::Time(*t),
        (ValueType::DateTime, NativeValue::DateTime(dt)) => Value::DateTime(*dt),
        (ValueType::DateTimeOffset, NativeValue::DateTimeOffset(dt)) => {
            Value::DateTimeOffset(*dt)
        }
        (ValueType::Guid, NativeValue::Guid(g)) => Value::Guid(*g),
        (ValueType::Enum { storage, .. }, n) => {
            let v = n.as_i64().ok_or_else(mismatch)?;
            Value::integral(&storage_type(*storage), v).ok_or_else(mismatch)?
        }
        _ => return Err(mismatch()),
    };
    Ok(value)
}

const fn storage_type(storage: EnumStorage) -> ValueType {
    match storage {
        EnumStorage::Char => ValueType::Char,
        EnumStorage::Byte => ValueType::Byte,
        EnumStorage::Int16 => ValueType::Int16,
        EnumStorage::Int32 => ValueType::Int32,
        EnumStorage::Int64 => ValueType::Int64,
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

// ── Parsing ────────────────────────────────────────────────────────────

/// Parses a literal produced by [`render_literal`] back into a value.
pub fn parse_literal(sql_type: &SqlType, value_type: &ValueType, text: &str) -> DataResult<Value> {
    if !is_compatible(value_type, sql_type.db_type())
        && !(*value_type == ValueType::String && sql_type.db_type() == SqlDbType::Xml)
    {
        return Err(DataError::NotSupported(format!(
            "{value_type} literal for SQL type {}",
            sql_type.sql()
        )));
    }
    let text = text.trim();
    let invalid =
        || DataError::SerializationError(format!("cannot parse literal {text} as {value_type}"));
    if text.eq_ignore_ascii_case("NULL") {
        return Ok(Value::Null);
    }
    if let Some(body) = unquote(text) {
        return parse_quoted(value_type, &body).ok_or_else(invalid);
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return match value_type {
            ValueType::Binary => parse_hex(hex).map(Value::Bytes).ok_or_else(invalid),
            _ => Err(invalid()),
        };
    }
    parse_number(value_type, text).ok_or_else(invalid)
}

fn unquote(text: &str) -> Option<String> {
    let text = text.strip_prefix('N').unwrap_or(text);
    let inner = text.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

fn parse_quoted(value_type: &ValueType, body: &str) -> Option<Value> {
    Some(match value_type {
        ValueType::String | ValueType::Xml => Value::String(body.to_string()),
        ValueType::Char
        | ValueType::Enum {
            storage: EnumStorage::Char,
            ..
        } => Value::Char(single_char(body)?),
        ValueType::Date => Value::Date(NaiveDate::parse_from_str(body, DATE_FORMAT).ok()?),
        ValueType::Time => Value::Time(NaiveTime::parse_from_str(body, "%H:%M:%S%.f").ok()?),
        ValueType::DateTime => Value::DateTime(
            NaiveDateTime::parse_from_str(body, "%Y-%m-%d %H:%M:%S%.f").ok()?,
        ),
        ValueType::DateTimeOffset => Value::DateTimeOffset(
            DateTime::parse_from_str(body, "%Y-%m-%d %H:%M:%S%.f %:z").ok()?,
        ),
        ValueType::Guid => Value::Guid(Uuid::parse_str(body).ok()?),
        _ => return None,
    })
}

fn parse_number(value_type: &ValueType, text: &str) -> Option<Value> {
    Some(match value_type {
        ValueType::Boolean => match text {
            "1" => Value::Bool(true),
            "0" => Value::Bool(false),
            _ => return None,
        },
        ValueType::Byte | ValueType::Int16 | ValueType::Int32 | ValueType::Int64 => {
            Value::integral(value_type, text.parse().ok()?)?
        }
        ValueType::Enum { storage, .. } => {
            Value::integral(&storage_type(*storage), text.parse().ok()?)?
        }
        ValueType::Single => Value::Single(text.parse().ok()?),
        ValueType::Double => Value::Double(text.parse().ok()?),
        ValueType::Decimal => Value::Decimal(Decimal::from_str(text).ok()?),
        _ => return None,
    })
}

fn parse_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::TypeMapper;
    use crate::sql_type::MAX_SIZE;
    use chrono::{NaiveDate, TimeZone};

    fn roundtrip(sql_type: &SqlType, value: &Value) {
        let vt = value.value_type().unwrap_or(ValueType::String);
        let literal = render_literal(sql_type, value).unwrap();
        let parsed = parse_literal(sql_type, &vt, &literal).unwrap();
        assert_eq!(&parsed, value, "literal {literal}");
        let native = to_native(sql_type, value).unwrap();
        assert_eq!(&decode(&vt, &native).unwrap(), value);
    }

    fn sample_date_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_nano_opt(13, 45, 7, 123_456_700)
            .unwrap()
    }

    #[test]
    fn test_literal_roundtrip_every_default_type() {
        let mapper = TypeMapper::new();
        let offset = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();
        let values = vec![
            Value::Bool(true),
            Value::Byte(255),
            Value::Int16(-12),
            Value::Int32(i32::MIN),
            Value::Int64(i64::MAX),
            Value::Single(0.1),
            Value::Double(-2.5e-300),
            Value::Decimal(Decimal::new(-12345, 2)),
            Value::Char('\''),
            Value::String("O'Brien ü".into()),
            Value::Bytes(vec![0x00, 0xAB, 0xFF]),
            Value::Date(NaiveDate::from_ymd_opt(1, 1, 1).unwrap()),
            Value::Time(sample_date_time().time()),
            Value::DateTime(sample_date_time()),
            Value::DateTimeOffset(offset.from_local_datetime(&sample_date_time()).unwrap()),
            Value::Guid(Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0)),
        ];
        for value in values {
            let vt = value.value_type().unwrap();
            roundtrip(&mapper.default_for(&vt).unwrap(), &value);
        }
    }

    #[test]
    fn test_null_roundtrip() {
        let int = SqlType::int();
        assert_eq!(render_literal(&int, &Value::Null).unwrap(), "NULL");
        assert_eq!(parse_literal(&int, &ValueType::Int32, "NULL").unwrap(), Value::Null);
        assert_eq!(to_native(&int, &Value::Null).unwrap(), NativeValue::DbNull);
        assert_eq!(decode(&ValueType::Int32, &NativeValue::DbNull).unwrap(), Value::Null);
    }

    #[test]
    fn test_string_quoting() {
        let varchar = SqlType::var_char(50).unwrap();
        let nvarchar = SqlType::n_var_char(MAX_SIZE).unwrap();
        assert_eq!(render_literal(&varchar, &Value::from("a'b")).unwrap(), "'a''b'");
        assert_eq!(render_literal(&nvarchar, &Value::from("a'b")).unwrap(), "N'a''b'");
        assert_eq!(quote_identifier("Odd]Name"), "[Odd]]Name]");
    }

    #[test]
    fn test_date_time_formats_follow_precision() {
        let dt = Value::DateTime(sample_date_time());
        assert_eq!(
            render_literal(&SqlType::date_time2(7).unwrap(), &dt).unwrap(),
            "'2024-02-29 13:45:07.1234567'"
        );
        assert_eq!(
            render_literal(&SqlType::date_time(), &dt).unwrap(),
            "'2024-02-29 13:45:07.123'"
        );
        assert_eq!(
            render_literal(&SqlType::small_date_time(), &dt).unwrap(),
            "'2024-02-29 13:45:07'"
        );
        let date = Value::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(render_literal(&SqlType::date(), &date).unwrap(), "'2024-01-05'");
    }

    #[test]
    fn test_date_time_offset_format() {
        let offset = FixedOffset::west_opt(8 * 3600).unwrap();
        let dto = offset.from_local_datetime(&sample_date_time()).unwrap();
        assert_eq!(
            render_literal(&SqlType::date_time_offset(7).unwrap(), &Value::DateTimeOffset(dto))
                .unwrap(),
            "'2024-02-29 13:45:07.1234567 -08:00'"
        );
    }

    #[test]
    fn test_float_formatting() {
        assert_eq!(render_literal(&SqlType::float(), &Value::Double(1.5)).unwrap(), "1.5E0");
        assert_eq!(render_literal(&SqlType::float(), &Value::Double(100.0)).unwrap(), "1E2");
        assert_eq!(render_literal(&SqlType::real(), &Value::Single(0.1)).unwrap(), "1E-1");
        let err = render_literal(&SqlType::float(), &Value::Double(f64::NAN)).unwrap_err();
        assert!(matches!(err, DataError::ArgumentOutOfRange(_)));
        assert!(render_literal(&SqlType::real(), &Value::Single(f32::INFINITY)).is_err());
    }

    #[test]
    fn test_binary_literal_and_native() {
        let vb = SqlType::var_binary(MAX_SIZE).unwrap();
        let bytes = Value::Bytes(vec![0xDE, 0xAD]);
        assert_eq!(render_literal(&vb, &bytes).unwrap(), "0xDEAD");
        assert_eq!(render_literal(&vb, &Value::Bytes(vec![])).unwrap(), "0x");
        assert_eq!(to_native(&vb, &bytes).unwrap(), NativeValue::Bytes(vec![0xDE, 0xAD]));
    }

    #[test]
    fn test_bit_literals() {
        assert_eq!(render_literal(&SqlType::bit(), &Value::Bool(true)).unwrap(), "1");
        assert_eq!(render_literal(&SqlType::bit(), &Value::Bool(false)).unwrap(), "0");
    }

    #[test]
    fn test_mismatched_value_rejected() {
        let err = render_literal(&SqlType::int(), &Value::from("x")).unwrap_err();
        assert!(matches!(err, DataError::NotSupported(ref m) if m.contains("INT")));
        assert!(to_native(&SqlType::bit(), &Value::Int32(1)).is_err());
    }

    #[test]
    fn test_integral_widths_convert() {
        assert_eq!(to_native(&SqlType::big_int(), &Value::Int32(7)).unwrap(), NativeValue::I64(7));
        assert_eq!(to_native(&SqlType::tiny_int(), &Value::Int64(7)).unwrap(), NativeValue::U8(7));
        assert!(to_native(&SqlType::tiny_int(), &Value::Int64(700)).is_err());
        assert_eq!(decode(&ValueType::Int64, &NativeValue::I32(9)).unwrap(), Value::Int64(9));
    }

    #[test]
    fn test_enum_decode() {
        let status = ValueType::Enum {
            name: "Status".into(),
            storage: EnumStorage::Byte,
        };
        assert_eq!(decode(&status, &NativeValue::U8(2)).unwrap(), Value::Byte(2));
        let grade = ValueType::Enum {
            name: "Grade".into(),
            storage: EnumStorage::Char,
        };
        assert_eq!(
            decode(&grade, &NativeValue::String("A".into())).unwrap(),
            Value::Char('A')
        );
    }

    #[test]
    fn test_decode_mismatch_names_type() {
        let err = decode(&ValueType::Guid, &NativeValue::I32(1)).unwrap_err();
        assert!(matches!(err, DataError::SerializationError(ref m) if m.contains("Guid")));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_literal(&SqlType::int(), &ValueType::Int32, "12a").is_err());
        assert!(parse_literal(&SqlType::var_binary(10).unwrap(), &ValueType::Binary, "0xABC").is_err());
        assert!(parse_literal(&SqlType::int(), &ValueType::String, "'x'").is_err());
    }
}
