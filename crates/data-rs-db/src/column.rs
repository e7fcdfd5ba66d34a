//! Logical column definitions.
//!
//! A [`Column`] carries a logical [`ValueType`], a physical name, nullability,
//! and the optional identity, default, and computation specifications that
//! DDL generation needs. Columns are shared as `Arc<Column>` between a
//! [`Model`](crate::model::Model) and the expressions that reference them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::expr::Expr;

static COLUMN_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A process-unique column identity, used as the key for per-column type
/// overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(u64);

impl ColumnId {
    fn next() -> Self {
        Self(COLUMN_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// The underlying storage of an enum-backed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumStorage {
    /// One character per value.
    Char,
    /// Unsigned 8-bit discriminants.
    Byte,
    /// 16-bit discriminants.
    Int16,
    /// 32-bit discriminants.
    Int32,
    /// 64-bit discriminants.
    Int64,
}

/// The logical type of a column, independent of any SQL dialect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Boolean,
    Byte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    Char,
    String,
    Binary,
    Date,
    Time,
    DateTime,
    DateTimeOffset,
    Guid,
    Xml,
    /// An enum stored as its discriminant or character code.
    Enum {
        /// The concrete enum type name; descriptors are cached per name.
        name: String,
        /// How values are stored.
        storage: EnumStorage,
    },
    /// A type with no built-in mapping; requires an explicit override.
    Custom(String),
}

impl ValueType {
    /// Returns `true` for the integral types an identity column may use.
    pub const fn is_integral(&self) -> bool {
        matches!(self, Self::Byte | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Returns a short name used in error messages.
    pub fn name(&self) -> &str {
        match self {
            Self::Boolean => "Boolean",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Single => "Single",
            Self::Double => "Double",
            Self::Decimal => "Decimal",
            Self::Char => "Char",
            Self::String => "String",
            Self::Binary => "Binary",
            Self::Date => "Date",
            Self::Time => "Time",
            Self::DateTime => "DateTime",
            Self::DateTimeOffset => "DateTimeOffset",
            Self::Guid => "Guid",
            Self::Xml => "Xml",
            Self::Enum { name, .. } | Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An identity (auto-increment) specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub seed: i64,
    pub increment: i64,
}

/// A logical column.
///
/// # Examples
///
/// ```
/// use data_rs_db::column::{Column, ValueType};
///
/// let id = Column::new("Id", ValueType::Int32).identity(1, 1);
/// assert!(id.identity.is_some());
/// assert!(!id.nullable);
/// ```
#[derive(Debug, Clone)]
pub struct Column {
    pub id: ColumnId,
    /// The physical column name.
    pub name: String,
    pub value_type: ValueType,
    pub nullable: bool,
    pub identity: Option<Identity>,
    /// A default constraint expression.
    pub default: Option<Expr>,
    /// A database-computed column expression.
    pub computation: Option<Expr>,
    pub description: Option<String>,
}

impl Column {
    /// Creates a non-nullable column.
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            id: ColumnId::next(),
            name: name.into(),
            value_type,
            nullable: false,
            identity: None,
            default: None,
            computation: None,
            description: None,
        }
    }

    /// Marks the column nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Makes this an identity column.
    pub fn identity(mut self, seed: i64, increment: i64) -> Self {
        self.identity = Some(Identity { seed, increment });
        self
    }

    /// Sets the default expression.
    pub fn default_value(mut self, expr: Expr) -> Self {
        self.default = Some(expr);
        self
    }

    /// Makes this a database-computed column.
    pub fn computed(mut self, expr: Expr) -> Self {
        self.computation = Some(expr);
        self
    }

    /// Attaches a human-readable description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns `true` if an INSERT may supply a value for this column.
    pub const fn is_insertable(&self) -> bool {
        self.identity.is_none() && self.computation.is_none()
    }

    /// Returns a copy of this column with a fresh [`ColumnId`].
    ///
    /// Type overrides are keyed by id, so a copy starts unconfigured.
    pub fn duplicate(&self) -> Self {
        Self {
            id: ColumnId::next(),
            ..self.clone()
        }
    }
}
