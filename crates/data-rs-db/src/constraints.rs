//! Keys, constraints, and indexes declared on a [`Model`].
//!
//! These are plain descriptions; the SQL Server DDL generator turns them into
//! `CONSTRAINT` and `INDEX` clauses of a `CREATE TABLE` statement.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use data_rs_db::column::{Column, ValueType};
//! use data_rs_db::constraints::{CheckConstraint, Constraint};
//! use data_rs_db::model::Model;
//! use data_rs_db::expr::Expr;
//!
//! let mut product = Model::new("Product");
//! let price = product.add_column(Column::new("Price", ValueType::Decimal));
//! let condition = product.col(&price).ge(Expr::constant(rust_decimal::Decimal::ZERO));
//! product.add_constraint(Constraint::Check(CheckConstraint::new("CK_Product_Price", condition)));
//! assert_eq!(product.constraints[0].name(), Some("CK_Product_Price"));
//! ```

use std::sync::Arc;

use crate::column::Column;
use crate::expr::Expr;
use crate::model::{Model, ModelId, SortDirection};

/// An ordered key column list.
pub type KeyColumns = Vec<(Arc<Column>, SortDirection)>;

/// The primary key of a model.
#[derive(Debug, Clone)]
pub struct PrimaryKey {
    pub name: String,
    pub columns: KeyColumns,
    pub clustered: bool,
    pub description: Option<String>,
}

impl PrimaryKey {
    /// Creates a clustered primary key.
    pub fn new(name: impl Into<String>, columns: KeyColumns) -> Self {
        Self {
            name: name.into(),
            columns,
            clustered: true,
            description: None,
        }
    }

    pub fn nonclustered(mut self) -> Self {
        self.clustered = false;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A UNIQUE constraint.
#[derive(Debug, Clone)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: KeyColumns,
    pub clustered: bool,
    pub description: Option<String>,
}

impl UniqueConstraint {
    /// Creates a nonclustered unique constraint.
    pub fn new(name: impl Into<String>, columns: KeyColumns) -> Self {
        Self {
            name: name.into(),
            columns,
            clustered: false,
            description: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A CHECK constraint over a boolean expression.
#[derive(Debug, Clone)]
pub struct CheckConstraint {
    pub name: String,
    pub condition: Expr,
    pub description: Option<String>,
}

impl CheckConstraint {
    pub fn new(name: impl Into<String>, condition: Expr) -> Self {
        Self {
            name: name.into(),
            condition,
            description: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The referential action of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForeignKeyRule {
    #[default]
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
}

impl ForeignKeyRule {
    /// Returns the T-SQL keyword for this rule.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// A FOREIGN KEY constraint.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<Arc<Column>>,
    pub referenced_model: ModelId,
    pub referenced_table: String,
    pub referenced_schema: Option<String>,
    pub referenced_columns: Vec<String>,
    pub on_delete: ForeignKeyRule,
    pub on_update: ForeignKeyRule,
    pub description: Option<String>,
}

impl ForeignKey {
    /// Creates a foreign key referencing `columns` of `parent`.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<Arc<Column>>,
        parent: &Model,
        referenced_columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            referenced_model: parent.id,
            referenced_table: parent.name.clone(),
            referenced_schema: parent.schema.clone(),
            referenced_columns,
            on_delete: ForeignKeyRule::NoAction,
            on_update: ForeignKeyRule::NoAction,
            description: None,
        }
    }

    pub fn on_delete(mut self, rule: ForeignKeyRule) -> Self {
        self.on_delete = rule;
        self
    }

    pub fn on_update(mut self, rule: ForeignKeyRule) -> Self {
        self.on_update = rule;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A table-level constraint other than the primary key.
#[derive(Debug, Clone)]
pub enum Constraint {
    Unique(UniqueConstraint),
    Check(CheckConstraint),
    ForeignKey(ForeignKey),
}

impl Constraint {
    /// Returns the constraint name. Empty names are reported as `None`.
    pub fn name(&self) -> Option<&str> {
        let name = match self {
            Self::Unique(c) => &c.name,
            Self::Check(c) => &c.name,
            Self::ForeignKey(c) => &c.name,
        };
        (!name.is_empty()).then_some(name.as_str())
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Unique(c) => c.description.as_deref(),
            Self::Check(c) => c.description.as_deref(),
            Self::ForeignKey(c) => c.description.as_deref(),
        }
    }
}

/// A table index.
#[derive(Debug, Clone)]
pub struct Index {
    pub name: String,
    pub columns: KeyColumns,
    pub unique: bool,
    pub clustered: bool,
    pub description: Option<String>,
}

impl Index {
    /// Creates a nonclustered, non-unique index.
    pub fn new(name: impl Into<String>, columns: KeyColumns) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
            clustered: false,
            description: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn clustered(mut self) -> Self {
        self.clustered = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ValueType;

    #[test]
    fn test_foreign_key_rule_sql() {
        assert_eq!(ForeignKeyRule::NoAction.as_sql(), "NO ACTION");
        assert_eq!(ForeignKeyRule::Cascade.as_sql(), "CASCADE");
        assert_eq!(ForeignKeyRule::SetNull.as_sql(), "SET NULL");
        assert_eq!(ForeignKeyRule::SetDefault.as_sql(), "SET DEFAULT");
    }

    #[test]
    fn test_foreign_key_copies_parent_location() {
        let parent = Model::new("Customer").with_schema("Sales");
        let col = Arc::new(Column::new("CustomerId", ValueType::Int32));
        let fk = ForeignKey::new("FK_X", vec![col], &parent, vec!["Id".into()])
            .on_delete(ForeignKeyRule::Cascade);
        assert_eq!(fk.referenced_model, parent.id);
        assert_eq!(fk.referenced_table, "Customer");
        assert_eq!(fk.referenced_schema.as_deref(), Some("Sales"));
        assert_eq!(fk.on_delete, ForeignKeyRule::Cascade);
        assert_eq!(fk.on_update, ForeignKeyRule::NoAction);
    }

    #[test]
    fn test_constraint_name_and_description() {
        let unique = Constraint::Unique(UniqueConstraint::new("", vec![]).describe("one per email"));
        assert_eq!(unique.name(), None);
        assert_eq!(unique.description(), Some("one per email"));
    }

    #[test]
    fn test_index_builders() {
        let idx = Index::new("IX_A", vec![]).unique().clustered();
        assert!(idx.unique);
        assert!(idx.clustered);
    }
}
