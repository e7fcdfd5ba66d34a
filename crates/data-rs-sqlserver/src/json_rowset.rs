//! Shipping in-memory rows to the server as one JSON parameter.
//!
//! A [`DataSet`] is serialized to a JSON array (one object per row, keyed by
//! column name, plus a `sys_row_id` holding the row position) and bound as a
//! single NVARCHAR(MAX) parameter. The matching [`Model`] has a
//! [`RowSource::JsonRowset`] source, so the statement generator reads it
//! back with `OPENJSON(@pN) WITH (...)`.
//!
//! Value encoding matches what `OPENJSON ... WITH` converts natively: ISO
//! dates with a `T` separator and the column's fractional digits, decimals
//! as strings (no float rounding), binary as base64.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use data_rs_core::{DataError, DataResult};
use data_rs_db::{Column, DataSet, Model, Param, ParamCell, RowSource, Value, ValueType};
use serde_json::{Map, Number};

use crate::codec::{format_time, to_native, NativeValue};
use crate::mapper::TypeMapper;
use crate::sql_type::SqlType;

/// The synthetic row-position column.
pub const ROW_ID_COLUMN: &str = "sys_row_id";

/// A data set packaged as a JSON rowset source.
#[derive(Debug, Clone)]
pub struct JsonRowset {
    /// The rowset model: `sys_row_id` followed by the shipped columns.
    pub model: Arc<Model>,
    pub row_id: Arc<Column>,
    /// The NVARCHAR(MAX) parameter holding the JSON text.
    pub param: Param,
}

impl JsonRowset {
    /// Serializes `columns` of every row in `data`.
    ///
    /// The rowset model shares the column handles, so per-column type
    /// overrides apply to the `OPENJSON` schema as well.
    pub fn build(data: &DataSet, columns: &[Arc<Column>], mapper: &TypeMapper) -> DataResult<Self> {
        let json = dataset_to_json(data, columns, mapper)?;
        let param = ParamCell::shared(ValueType::String, json);
        let source = data.model();
        let mut model = Model::derived(source.alias_prefix.clone())
            .with_source(RowSource::JsonRowset(Arc::clone(&param)));
        let row_id = model.add_column(Column::new(ROW_ID_COLUMN, ValueType::Int32));
        for column in columns {
            model.columns.push(Arc::clone(column));
        }
        Ok(Self {
            model: Arc::new(model),
            row_id,
            param,
        })
    }
}

/// Serializes `columns` of every row in `data` to a JSON array.
pub fn dataset_to_json(
    data: &DataSet,
    columns: &[Arc<Column>],
    mapper: &TypeMapper,
) -> DataResult<String> {
    let model = data.model();
    let mut layout = Vec::with_capacity(columns.len());
    for column in columns {
        let ordinal = model.ordinal_of(column).ok_or_else(|| {
            DataError::InvalidStatement(format!(
                "column '{}' does not belong to model '{}'",
                column.name, model.name
            ))
        })?;
        layout.push((ordinal, column, mapper.resolve(column)?));
    }

    let mut rows = Vec::with_capacity(data.len());
    for (position, row) in data.rows().iter().enumerate() {
        let mut object = Map::new();
        object.insert(ROW_ID_COLUMN.to_string(), serde_json::Value::from(position));
        for (ordinal, column, sql_type) in &layout {
            let value = row.get(*ordinal).unwrap_or(&Value::Null);
            let json = to_json_value(sql_type, value).map_err(|e| match e {
                DataError::NotSupported(msg) | DataError::ArgumentOutOfRange(msg) => {
                    DataError::SerializationError(format!(
                        "row {position}, column '{}': {msg}",
                        column.name
                    ))
                }
                other => other,
            })?;
            object.insert(column.name.clone(), json);
        }
        rows.push(serde_json::Value::Object(object));
    }
    Ok(serde_json::to_string(&serde_json::Value::Array(rows))?)
}

/// Encodes one value for `OPENJSON ... WITH (col <sql_type>)`.
pub fn to_json_value(sql_type: &SqlType, value: &Value) -> DataResult<serde_json::Value> {
    let digits = sql_type.fractional_digits();
    let json = match to_native(sql_type, value)? {
        NativeValue::DbNull => serde_json::Value::Null,
        NativeValue::Bool(b) => serde_json::Value::Bool(b),
        NativeValue::U8(v) => v.into(),
        NativeValue::I16(v) => v.into(),
        NativeValue::I32(v) => v.into(),
        NativeValue::I64(v) => v.into(),
        NativeValue::F32(v) => float(f64::from(v))?,
        NativeValue::F64(v) => float(v)?,
        NativeValue::Decimal(d) => serde_json::Value::String(d.to_string()),
        NativeValue::String(s) => serde_json::Value::String(s),
        NativeValue::Bytes(b) => serde_json::Value::String(STANDARD.encode(b)),
        NativeValue::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
        NativeValue::Time(t) => serde_json::Value::String(format_time(t, digits)),
        NativeValue::DateTime(dt) => serde_json::Value::String(format!(
            "{}T{}",
            dt.format("%Y-%m-%d"),
            format_time(dt.time(), digits)
        )),
        NativeValue::DateTimeOffset(dt) => serde_json::Value::String(format!(
            "{}T{}{}",
            dt.format("%Y-%m-%d"),
            format_time(dt.time(), digits),
            dt.format("%:z")
        )),
        NativeValue::Guid(g) => serde_json::Value::String(g.to_string()),
    };
    Ok(json)
}

fn float(v: f64) -> DataResult<serde_json::Value> {
    Number::from_f64(v)
        .map(serde_json::Value::Number)
        .ok_or_else(|| {
            DataError::ArgumentOutOfRange(format!("floating point value {v} has no JSON form"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn order_set() -> (DataSet, Vec<Arc<Column>>) {
        let mut m = Model::new("Order");
        m.add_column(Column::new("Id", ValueType::Int32).identity(1, 1));
        let total = m.add_column(Column::new("Total", ValueType::Decimal));
        let placed = m.add_column(Column::new("Placed", ValueType::DateTime).nullable());
        let blob = m.add_column(Column::new("Blob", ValueType::Binary).nullable());
        let m = Arc::new(m);
        let mut data = DataSet::new(&m);
        let when = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        data.add_row_with(vec![
            (&total, Value::Decimal(Decimal::new(1999, 2))),
            (&placed, Value::DateTime(when)),
            (&blob, Value::Bytes(vec![1, 2, 3])),
        ])
        .unwrap();
        data.add_row_with(vec![(&total, Value::Decimal(Decimal::ONE))])
            .unwrap();
        let columns = m.insertable_columns().cloned().collect();
        (data, columns)
    }

    #[test]
    fn test_dataset_serialization() {
        let (data, columns) = order_set();
        let text = dataset_to_json(&data, &columns, &TypeMapper::new()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            parsed,
            json!([
                {
                    "sys_row_id": 0,
                    "Total": "19.99",
                    "Placed": "2024-03-01T08:30:00.0000000",
                    "Blob": "AQID"
                },
                { "sys_row_id": 1, "Total": "1", "Placed": null, "Blob": null }
            ])
        );
    }

    #[test]
    fn test_rowset_model_shares_columns() {
        let (data, columns) = order_set();
        let rowset = JsonRowset::build(&data, &columns, &TypeMapper::new()).unwrap();
        assert_eq!(rowset.model.columns.len(), columns.len() + 1);
        assert_eq!(rowset.model.columns[0].name, ROW_ID_COLUMN);
        assert!(Arc::ptr_eq(&rowset.model.columns[1], &columns[0]));
        assert!(matches!(rowset.model.source, RowSource::JsonRowset(_)));
        assert!(matches!(rowset.param.value(), Value::String(ref s) if s.starts_with('[')));
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let err = to_json_value(&SqlType::float(), &Value::Double(f64::INFINITY)).unwrap_err();
        assert!(matches!(err, DataError::ArgumentOutOfRange(_)));
    }

    #[test]
    fn test_foreign_column_rejected() {
        let (data, _) = order_set();
        let stray = Arc::new(Column::new("Stray", ValueType::Int32));
        let err = dataset_to_json(&data, &[stray], &TypeMapper::new()).unwrap_err();
        assert!(matches!(err, DataError::InvalidStatement(ref m) if m.contains("Stray")));
    }
}
