//! SQL Server scalar type descriptors.
//!
//! A [`SqlType`] is a validated `(db type, size | MAX, precision, scale, UDT
//! name)` tuple. Constructors check facets against SQL Server's bounds and
//! fail with [`DataError::ArgumentOutOfRange`] naming the facet, so an invalid
//! descriptor never reaches rendering.
//!
//! # Examples
//!
//! ```
//! use data_rs_sqlserver::sql_type::SqlType;
//!
//! assert_eq!(SqlType::var_char(-1).unwrap().sql(), "VARCHAR(MAX)");
//! assert_eq!(SqlType::decimal(18, 2).unwrap().sql(), "DECIMAL(18, 2)");
//! assert!(SqlType::n_var_char(4001).is_err());
//! ```

use std::fmt;

use data_rs_core::{DataError, DataResult};

/// Size sentinel meaning MAX.
pub const MAX_SIZE: i32 = -1;

/// The native parameter db-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDbType {
    Bit,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Real,
    Float,
    Decimal,
    Money,
    SmallMoney,
    Char,
    VarChar,
    NChar,
    NVarChar,
    Binary,
    VarBinary,
    Date,
    Time,
    SmallDateTime,
    DateTime,
    DateTime2,
    DateTimeOffset,
    UniqueIdentifier,
    Xml,
    Udt,
}

impl SqlDbType {
    /// The T-SQL type keyword.
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Bit => "BIT",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Int => "INT",
            Self::BigInt => "BIGINT",
            Self::Real => "REAL",
            Self::Float => "FLOAT",
            Self::Decimal => "DECIMAL",
            Self::Money => "MONEY",
            Self::SmallMoney => "SMALLMONEY",
            Self::Char => "CHAR",
            Self::VarChar => "VARCHAR",
            Self::NChar => "NCHAR",
            Self::NVarChar => "NVARCHAR",
            Self::Binary => "BINARY",
            Self::VarBinary => "VARBINARY",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::SmallDateTime => "SMALLDATETIME",
            Self::DateTime => "DATETIME",
            Self::DateTime2 => "DATETIME2",
            Self::DateTimeOffset => "DATETIMEOFFSET",
            Self::UniqueIdentifier => "UNIQUEIDENTIFIER",
            Self::Xml => "XML",
            Self::Udt => "UDT",
        }
    }

    /// Returns `true` for types whose string literals take the `N` prefix.
    pub const fn is_unicode(self) -> bool {
        matches!(self, Self::NChar | Self::NVarChar | Self::Xml)
    }

    /// Returns `true` for character types.
    pub const fn is_character(self) -> bool {
        matches!(self, Self::Char | Self::VarChar | Self::NChar | Self::NVarChar)
    }

    /// Returns `true` for integer types.
    pub const fn is_integral(self) -> bool {
        matches!(self, Self::TinyInt | Self::SmallInt | Self::Int | Self::BigInt)
    }
}

impl fmt::Display for SqlDbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A size facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Size {
    Fixed(u16),
    Max,
}

impl Size {
    /// Returns the native size, `-1` for MAX.
    pub fn as_native(self) -> i32 {
        match self {
            Self::Fixed(n) => i32::from(n),
            Self::Max => MAX_SIZE,
        }
    }
}

/// Parameter direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
}

/// The native parameter descriptor handed to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlParameterInfo {
    pub db_type: SqlDbType,
    /// `-1` means MAX.
    pub size: Option<i32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    pub udt_type_name: Option<String>,
}

/// A validated SQL scalar type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlType {
    db_type: SqlDbType,
    size: Option<Size>,
    precision: Option<u8>,
    scale: Option<u8>,
    udt_name: Option<String>,
}

impl SqlType {
    const fn plain(db_type: SqlDbType) -> Self {
        Self {
            db_type,
            size: None,
            precision: None,
            scale: None,
            udt_name: None,
        }
    }

    // ── Fixed-shape types ────────────────────────────────────────────

    pub const fn bit() -> Self {
        Self::plain(SqlDbType::Bit)
    }

    pub const fn tiny_int() -> Self {
        Self::plain(SqlDbType::TinyInt)
    }

    pub const fn small_int() -> Self {
        Self::plain(SqlDbType::SmallInt)
    }

    pub const fn int() -> Self {
        Self::plain(SqlDbType::Int)
    }

    pub const fn big_int() -> Self {
        Self::plain(SqlDbType::BigInt)
    }

    pub const fn real() -> Self {
        Self::plain(SqlDbType::Real)
    }

    pub const fn float() -> Self {
        Self::plain(SqlDbType::Float)
    }

    pub const fn money() -> Self {
        Self::plain(SqlDbType::Money)
    }

    pub const fn small_money() -> Self {
        Self::plain(SqlDbType::SmallMoney)
    }

    pub const fn date() -> Self {
        Self::plain(SqlDbType::Date)
    }

    pub const fn small_date_time() -> Self {
        Self::plain(SqlDbType::SmallDateTime)
    }

    pub const fn date_time() -> Self {
        Self::plain(SqlDbType::DateTime)
    }

    pub const fn unique_identifier() -> Self {
        Self::plain(SqlDbType::UniqueIdentifier)
    }

    pub const fn xml() -> Self {
        Self::plain(SqlDbType::Xml)
    }

    /// A user-defined type such as `geography`.
    pub fn udt(name: impl Into<String>) -> DataResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DataError::ArgumentOutOfRange(
                "UDT type name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            udt_name: Some(name),
            ..Self::plain(SqlDbType::Udt)
        })
    }

    // ── Sized types ──────────────────────────────────────────────────

    /// `CHAR(size)`, 1..=8000.
    pub fn char(size: i32) -> DataResult<Self> {
        Self::sized(SqlDbType::Char, size, 8000, false)
    }

    /// `VARCHAR(size)`, 1..=8000 or -1 for MAX.
    pub fn var_char(size: i32) -> DataResult<Self> {
        Self::sized(SqlDbType::VarChar, size, 8000, true)
    }

    /// `NCHAR(size)`, 1..=4000.
    pub fn n_char(size: i32) -> DataResult<Self> {
        Self::sized(SqlDbType::NChar, size, 4000, false)
    }

    /// `NVARCHAR(size)`, 1..=4000 or -1 for MAX.
    pub fn n_var_char(size: i32) -> DataResult<Self> {
        Self::sized(SqlDbType::NVarChar, size, 4000, true)
    }

    /// `BINARY(size)`, 1..=8000.
    pub fn binary(size: i32) -> DataResult<Self> {
        Self::sized(SqlDbType::Binary, size, 8000, false)
    }

    /// `VARBINARY(size)`, 1..=8000 or -1 for MAX.
    pub fn var_binary(size: i32) -> DataResult<Self> {
        Self::sized(SqlDbType::VarBinary, size, 8000, true)
    }

    fn sized(db_type: SqlDbType, size: i32, max: u16, allow_max: bool) -> DataResult<Self> {
        let size = if size == MAX_SIZE {
            if !allow_max {
                return Err(DataError::ArgumentOutOfRange(format!(
                    "size MAX is not allowed for fixed-length {db_type}"
                )));
            }
            Size::Max
        } else {
            match u16::try_from(size) {
                Ok(n) if (1..=max).contains(&n) => Size::Fixed(n),
                _ => {
                    let hint = if allow_max { " or -1 for MAX" } else { "" };
                    return Err(DataError::ArgumentOutOfRange(format!(
                        "size {size} for {db_type} (expected 1..={max}{hint})"
                    )));
                }
            }
        };
        Ok(Self {
            size: Some(size),
            ..Self::plain(db_type)
        })
    }

    // ── Precision/scale types ────────────────────────────────────────

    /// `DECIMAL(precision, scale)`: precision 1..=38, scale 0..=precision.
    pub fn decimal(precision: u8, scale: u8) -> DataResult<Self> {
        if !(1..=38).contains(&precision) {
            return Err(DataError::ArgumentOutOfRange(format!(
                "precision {precision} for DECIMAL (expected 1..=38)"
            )));
        }
        if scale > precision {
            return Err(DataError::ArgumentOutOfRange(format!(
                "scale {scale} for DECIMAL({precision}) (expected 0..={precision})"
            )));
        }
        Ok(Self {
            precision: Some(precision),
            scale: Some(scale),
            ..Self::plain(SqlDbType::Decimal)
        })
    }

    /// `TIME(precision)`, 1..=7.
    pub fn time(precision: u8) -> DataResult<Self> {
        Self::fractional(SqlDbType::Time, precision)
    }

    /// `DATETIME2(precision)`, 1..=7.
    pub fn date_time2(precision: u8) -> DataResult<Self> {
        Self::fractional(SqlDbType::DateTime2, precision)
    }

    /// `DATETIMEOFFSET(precision)`, 1..=7.
    pub fn date_time_offset(precision: u8) -> DataResult<Self> {
        Self::fractional(SqlDbType::DateTimeOffset, precision)
    }

    fn fractional(db_type: SqlDbType, precision: u8) -> DataResult<Self> {
        if !(1..=7).contains(&precision) {
            return Err(DataError::ArgumentOutOfRange(format!(
                "precision {precision} for {db_type} (expected 1..=7)"
            )));
        }
        Ok(Self {
            precision: Some(precision),
            ..Self::plain(db_type)
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub const fn db_type(&self) -> SqlDbType {
        self.db_type
    }

    pub const fn size(&self) -> Option<Size> {
        self.size
    }

    pub const fn precision(&self) -> Option<u8> {
        self.precision
    }

    pub const fn scale(&self) -> Option<u8> {
        self.scale
    }

    pub fn udt_name(&self) -> Option<&str> {
        self.udt_name.as_deref()
    }

    pub const fn is_unicode(&self) -> bool {
        self.db_type.is_unicode()
    }

    /// Fractional-second digits carried by date/time literals of this type.
    pub fn fractional_digits(&self) -> u8 {
        match self.db_type {
            SqlDbType::DateTime => 3,
            SqlDbType::Time | SqlDbType::DateTime2 | SqlDbType::DateTimeOffset => {
                self.precision.unwrap_or(7)
            }
            _ => 0,
        }
    }

    /// Renders the type as it appears in DDL and CAST.
    pub fn sql(&self) -> String {
        if let Some(name) = &self.udt_name {
            return name.clone();
        }
        let keyword = self.db_type.keyword();
        match (self.size, self.precision, self.scale) {
            (Some(Size::Max), _, _) => format!("{keyword}(MAX)"),
            (Some(Size::Fixed(n)), _, _) => format!("{keyword}({n})"),
            (None, Some(p), Some(s)) => format!("{keyword}({p}, {s})"),
            (None, Some(p), None) => format!("{keyword}({p})"),
            _ => keyword.to_string(),
        }
    }

    /// Returns the native parameter descriptor.
    pub fn parameter_info(&self) -> SqlParameterInfo {
        SqlParameterInfo {
            db_type: self.db_type,
            size: self.size.map(Size::as_native),
            precision: self.precision,
            scale: self.scale,
            udt_type_name: self.udt_name.clone(),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql())
    }
}
