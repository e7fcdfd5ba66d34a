//! Models: ordered column collections with keys, constraints, and indexes.
//!
//! A [`Model`] describes one row shape together with where its rows come
//! from ([`RowSource`]). Models are built with `&mut self` methods and then
//! frozen behind an `Arc`; every model gets a process-unique [`ModelId`] that
//! keys alias maps and temp-table names.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use data_rs_db::column::{Column, ValueType};
//! use data_rs_db::constraints::PrimaryKey;
//! use data_rs_db::model::{Model, SortDirection};
//!
//! let mut orders = Model::new("SalesOrder").with_schema("Sales");
//! let id = orders.add_column(Column::new("Id", ValueType::Int32).identity(1, 1));
//! orders.add_column(Column::new("Total", ValueType::Decimal));
//! orders.set_primary_key(PrimaryKey::new("PK_SalesOrder", vec![(id, SortDirection::Ascending)]));
//! let orders = Arc::new(orders);
//! assert_eq!(orders.identity_column().map(|c| c.name.as_str()), Some("Id"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::column::{Column, ValueType};
use crate::constraints::{Constraint, Index, PrimaryKey};
use crate::expr::{ColumnRef, Expr, Param};

static MODEL_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A process-unique model identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(u64);

impl ModelId {
    fn next() -> Self {
        Self(MODEL_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Sort direction for keys, indexes, and ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Unspecified,
    Ascending,
    Descending,
}

/// Where a model's rows come from.
#[derive(Debug, Clone)]
pub enum RowSource {
    /// A permanent table named after the model.
    Table,
    /// A session temp table; its realized name is assigned by the session.
    TempTable,
    /// Rows shipped as a JSON array in a string parameter.
    JsonRowset(Param),
    /// The output shape of a query; has no physical source.
    Derived,
}

/// A relational model.
#[derive(Debug, Clone)]
pub struct Model {
    pub id: ModelId,
    /// The table name (permanent tables) or base name (everything else).
    pub name: String,
    pub schema: Option<String>,
    /// Base for aliases when the model is not a physical table.
    pub alias_prefix: String,
    pub source: RowSource,
    pub columns: Vec<Arc<Column>>,
    pub primary_key: Option<PrimaryKey>,
    pub constraints: Vec<Constraint>,
    pub indexes: Vec<Index>,
    pub description: Option<String>,
}

impl Model {
    /// Creates an empty model backed by a permanent table.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: ModelId::next(),
            alias_prefix: name.clone(),
            name,
            schema: None,
            source: RowSource::Table,
            columns: Vec::new(),
            primary_key: None,
            constraints: Vec::new(),
            indexes: Vec::new(),
            description: None,
        }
    }

    /// Creates an empty model describing a derived (query output) shape.
    pub fn derived(alias_prefix: impl Into<String>) -> Self {
        let mut model = Self::new(alias_prefix);
        model.source = RowSource::Derived;
        model
    }

    /// Creates an empty model backed by a session temp table.
    pub fn temp(name: impl Into<String>) -> Self {
        let mut model = Self::new(name);
        model.source = RowSource::TempTable;
        model
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_alias_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.alias_prefix = prefix.into();
        self
    }

    pub fn with_source(mut self, source: RowSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends a column and returns the shared handle.
    pub fn add_column(&mut self, column: Column) -> Arc<Column> {
        let column = Arc::new(column);
        self.columns.push(Arc::clone(&column));
        column
    }

    pub fn set_primary_key(&mut self, key: PrimaryKey) {
        self.primary_key = Some(key);
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn add_index(&mut self, index: Index) {
        self.indexes.push(index);
    }

    /// Looks a column up by physical name.
    pub fn column(&self, name: &str) -> Option<&Arc<Column>> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the ordinal of a column in this model.
    pub fn ordinal_of(&self, column: &Column) -> Option<usize> {
        self.columns.iter().position(|c| c.id == column.id)
    }

    /// Builds a column reference expression owned by this model.
    pub fn col(&self, column: &Arc<Column>) -> Expr {
        Expr::Column(ColumnRef::new(self.id, Arc::clone(column)))
    }

    /// Builds a column reference for a column looked up by name.
    pub fn col_named(&self, name: &str) -> Option<Expr> {
        self.column(name).map(|c| self.col(c))
    }

    /// Returns the identity column, if any.
    pub fn identity_column(&self) -> Option<&Arc<Column>> {
        self.columns.iter().find(|c| c.identity.is_some())
    }

    /// Returns the columns an INSERT writes when no projection is given:
    /// everything except identity and computed columns.
    pub fn insertable_columns(&self) -> impl Iterator<Item = &Arc<Column>> {
        self.columns.iter().filter(|c| c.is_insertable())
    }

    /// Returns `true` if `column` is part of the primary key.
    pub fn is_primary_key_column(&self, column: &Column) -> bool {
        self.primary_key
            .as_ref()
            .is_some_and(|pk| pk.columns.iter().any(|(c, _)| c.id == column.id))
    }

    /// Returns the foreign keys of this model that reference `column` of
    /// `parent`.
    pub fn foreign_keys_to<'a>(
        &'a self,
        parent: &'a Model,
        column: &'a Column,
    ) -> impl Iterator<Item = &'a Constraint> + 'a {
        self.constraints.iter().filter(move |c| match c {
            Constraint::ForeignKey(fk) => {
                fk.referenced_model == parent.id
                    && fk.referenced_columns.len() == 1
                    && fk.referenced_columns[0] == column.name
            }
            _ => false,
        })
    }

    /// Returns a copy with a new [`ModelId`] and alias prefix, for self joins.
    ///
    /// Columns are shared, so type overrides carry over.
    pub fn clone_as(&self, alias_prefix: impl Into<String>) -> Self {
        Self {
            id: ModelId::next(),
            alias_prefix: alias_prefix.into(),
            ..self.clone()
        }
    }

    /// Builds a derived model with one column per `(name, type)` pair.
    pub fn derived_with_columns<'a>(
        alias_prefix: impl Into<String>,
        columns: impl IntoIterator<Item = (&'a str, ValueType)>,
    ) -> Self {
        let mut model = Self::derived(alias_prefix);
        for (name, value_type) in columns {
            model.add_column(Column::new(name, value_type).nullable());
        }
        model
    }
}
