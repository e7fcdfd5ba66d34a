//! Logical type → SQL Server type mapping.
//!
//! [`TypeMapper`] holds the per-column overrides registered at model
//! definition time and falls back to a fixed default table. Enum-backed
//! columns resolve by storage kind, and the resulting descriptor is cached per
//! concrete enum type name.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use data_rs_core::{DataError, DataResult};
use data_rs_db::{Column, ColumnId, EnumStorage, ValueType};

use crate::sql_type::{SqlDbType, SqlType, MAX_SIZE};

/// Resolves the SQL type of columns and logical types.
///
/// # Examples
///
/// ```
/// use data_rs_db::{Column, ValueType};
/// use data_rs_sqlserver::mapper::TypeMapper;
/// use data_rs_sqlserver::sql_type::SqlType;
///
/// let name = Column::new("Name", ValueType::String);
/// let mut mapper = TypeMapper::new();
/// assert_eq!(mapper.resolve(&name).unwrap().sql(), "NVARCHAR(MAX)");
///
/// mapper.configure(&name, SqlType::n_var_char(100).unwrap()).unwrap();
/// assert_eq!(mapper.resolve(&name).unwrap().sql(), "NVARCHAR(100)");
/// ```
#[derive(Debug, Default)]
pub struct TypeMapper {
    overrides: HashMap<ColumnId, SqlType>,
    enum_cache: Mutex<HashMap<(String, EnumStorage), SqlType>>,
}

impl TypeMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an explicit SQL type for one column.
    ///
    /// Fails with [`DataError::NotSupported`] when the descriptor cannot hold
    /// the column's logical type.
    pub fn configure(&mut self, column: &Column, sql_type: SqlType) -> DataResult<()> {
        if !is_compatible(&column.value_type, sql_type.db_type()) {
            return Err(DataError::NotSupported(format!(
                "SQL type {} for column '{}' of logical type {}",
                sql_type.sql(),
                column.name,
                column.value_type
            )));
        }
        self.overrides.insert(column.id, sql_type);
        Ok(())
    }

    /// Returns the column's override, or the default for its logical type.
    pub fn resolve(&self, column: &Column) -> DataResult<SqlType> {
        if let Some(sql_type) = self.overrides.get(&column.id) {
            return Ok(sql_type.clone());
        }
        self.default_for(&column.value_type).map_err(|e| match e {
            DataError::NotSupported(msg) => {
                DataError::NotSupported(format!("{msg} (column '{}')", column.name))
            }
            other => other,
        })
    }

    /// Returns the default SQL type for a logical type.
    pub fn default_for(&self, value_type: &ValueType) -> DataResult<SqlType> {
        let sql_type = match value_type {
            ValueType::Boolean => SqlType::bit(),
            ValueType::Byte => SqlType::tiny_int(),
            ValueType::Int16 => SqlType::small_int(),
            ValueType::Int32 => SqlType::int(),
            ValueType::Int64 => SqlType::big_int(),
            ValueType::Single => SqlType::real(),
            ValueType::Double => SqlType::float(),
            ValueType::Decimal => SqlType::decimal(18, 2)?,
            ValueType::Char => SqlType::n_char(1)?,
            ValueType::String => SqlType::n_var_char(MAX_SIZE)?,
            ValueType::Binary => SqlType::var_binary(MAX_SIZE)?,
            ValueType::Date => SqlType::date(),
            ValueType::Time => SqlType::time(7)?,
            ValueType::DateTime => SqlType::date_time2(7)?,
            ValueType::DateTimeOffset => SqlType::date_time_offset(7)?,
            ValueType::Guid => SqlType::unique_identifier(),
            ValueType::Xml => SqlType::xml(),
            ValueType::Enum { name, storage } => return self.enum_type(name, *storage),
            ValueType::Custom(name) => {
                return Err(DataError::NotSupported(format!(
                    "no SQL type registered for logical type '{name}'"
                )))
            }
        };
        Ok(sql_type)
    }

    fn enum_type(&self, name: &str, storage: EnumStorage) -> DataResult<SqlType> {
        let mut cache = self
            .enum_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let key = (name.to_string(), storage);
        if let Some(cached) = cache.get(&key) {
            return Ok(cached.clone());
        }
        let sql_type = match storage {
            EnumStorage::Char => SqlType::char(1)?,
            EnumStorage::Byte => SqlType::tiny_int(),
            EnumStorage::Int16 => SqlType::small_int(),
            EnumStorage::Int32 => SqlType::int(),
            EnumStorage::Int64 => SqlType::big_int(),
        };
        cache.insert(key, sql_type.clone());
        Ok(sql_type)
    }

    /// Returns the number of cached enum descriptors.
    pub fn cached_enum_types(&self) -> usize {
        self.enum_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Returns `true` if values of `value_type` can be stored in `db_type`.
pub fn is_compatible(value_type: &ValueType, db_type: SqlDbType) -> bool {
    use SqlDbType as D;
    match value_type {
        ValueType::Boolean => db_type == D::Bit,
        ValueType::Byte => db_type == D::TinyInt,
        ValueType::Int16 => db_type == D::SmallInt,
        ValueType::Int32 => db_type == D::Int,
        ValueType::Int64 => db_type == D::BigInt,
        ValueType::Single => db_type == D::Real,
        ValueType::Double => db_type == D::Float,
        ValueType::Decimal => matches!(db_type, D::Decimal | D::Money | D::SmallMoney),
        ValueType::Char | ValueType::String => db_type.is_character(),
        ValueType::Binary => matches!(db_type, D::Binary | D::VarBinary),
        ValueType::Date => db_type == D::Date,
        ValueType::Time => db_type == D::Time,
        ValueType::DateTime => matches!(db_type, D::SmallDateTime | D::DateTime | D::DateTime2),
        ValueType::DateTimeOffset => db_type == D::DateTimeOffset,
        ValueType::Guid => db_type == D::UniqueIdentifier,
        ValueType::Xml => db_type == D::Xml,
        ValueType::Enum { storage, .. } => match storage {
            EnumStorage::Char => db_type.is_character(),
            _ => db_type.is_integral(),
        },
        ValueType::Custom(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_sql(vt: ValueType) -> String {
        TypeMapper::new().default_for(&vt).unwrap().sql()
    }

    #[test]
    fn test_default_table() {
        assert_eq!(default_sql(ValueType::Boolean), "BIT");
        assert_eq!(default_sql(ValueType::Byte), "TINYINT");
        assert_eq!(default_sql(ValueType::Int16), "SMALLINT");
        assert_eq!(default_sql(ValueType::Int32), "INT");
        assert_eq!(default_sql(ValueType::Int64), "BIGINT");
        assert_eq!(default_sql(ValueType::Single), "REAL");
        assert_eq!(default_sql(ValueType::Double), "FLOAT");
        assert_eq!(default_sql(ValueType::Decimal), "DECIMAL(18, 2)");
        assert_eq!(default_sql(ValueType::Char), "NCHAR(1)");
        assert_eq!(default_sql(ValueType::String), "NVARCHAR(MAX)");
        assert_eq!(default_sql(ValueType::Binary), "VARBINARY(MAX)");
        assert_eq!(default_sql(ValueType::Date), "DATE");
        assert_eq!(default_sql(ValueType::Time), "TIME(7)");
        assert_eq!(default_sql(ValueType::DateTime), "DATETIME2(7)");
        assert_eq!(default_sql(ValueType::DateTimeOffset), "DATETIMEOFFSET(7)");
        assert_eq!(default_sql(ValueType::Guid), "UNIQUEIDENTIFIER");
        assert_eq!(default_sql(ValueType::Xml), "XML");
    }

    #[test]
    fn test_custom_type_requires_override() {
        let mut mapper = TypeMapper::new();
        let shape = Column::new("Shape", ValueType::Custom("geography".into()));
        let err = mapper.resolve(&shape).unwrap_err();
        assert!(matches!(err, DataError::NotSupported(ref m) if m.contains("geography") && m.contains("Shape")));

        mapper.configure(&shape, SqlType::udt("geography").unwrap()).unwrap();
        assert_eq!(mapper.resolve(&shape).unwrap().sql(), "geography");
    }

    #[test]
    fn test_incompatible_override_rejected() {
        let mut mapper = TypeMapper::new();
        let amount = Column::new("Amount", ValueType::Decimal);
        let err = mapper.configure(&amount, SqlType::int()).unwrap_err();
        assert!(matches!(err, DataError::NotSupported(ref m) if m.contains("Amount")));
        mapper.configure(&amount, SqlType::money()).unwrap();
        assert_eq!(mapper.resolve(&amount).unwrap().sql(), "MONEY");
    }

    #[test]
    fn test_enum_types_by_storage_and_cached() {
        let mapper = TypeMapper::new();
        let status = ValueType::Enum {
            name: "OrderStatus".into(),
            storage: EnumStorage::Byte,
        };
        let grade = ValueType::Enum {
            name: "Grade".into(),
            storage: EnumStorage::Char,
        };
        assert_eq!(mapper.default_for(&status).unwrap().sql(), "TINYINT");
        assert_eq!(mapper.default_for(&status).unwrap().sql(), "TINYINT");
        assert_eq!(mapper.default_for(&grade).unwrap().sql(), "CHAR(1)");
        assert_eq!(mapper.cached_enum_types(), 2);
    }

    #[test]
    fn test_enum_cache_keyed_by_storage() {
        let mapper = TypeMapper::new();
        let as_char = ValueType::Enum {
            name: "Status".into(),
            storage: EnumStorage::Char,
        };
        let as_int = ValueType::Enum {
            name: "Status".into(),
            storage: EnumStorage::Int32,
        };
        assert_eq!(mapper.default_for(&as_char).unwrap().sql(), "CHAR(1)");
        assert_eq!(mapper.default_for(&as_int).unwrap().sql(), "INT");
        assert_eq!(mapper.default_for(&as_char).unwrap().sql(), "CHAR(1)");
        assert_eq!(mapper.cached_enum_types(), 2);
    }

    #[test]
    fn test_compatibility_table() {
        assert!(is_compatible(&ValueType::String, SqlDbType::VarChar));
        assert!(is_compatible(&ValueType::DateTime, SqlDbType::SmallDateTime));
        assert!(!is_compatible(&ValueType::DateTime, SqlDbType::Date));
        let big_enum = ValueType::Enum {
            name: "Flags".into(),
            storage: EnumStorage::Int64,
        };
        assert!(is_compatible(&big_enum, SqlDbType::BigInt));
        assert!(!is_compatible(&big_enum, SqlDbType::NChar));
    }
}
