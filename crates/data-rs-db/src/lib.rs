//! # data-rs-db
//!
//! The relational IR consumed by the data-rs dialect crates: typed
//! [`Value`](value::Value)s, logical [`Column`](column::Column)s,
//! [`Model`](model::Model)s with keys, constraints, and indexes, the
//! [`Expr`](expr::Expr) expression tree, [`Statement`](statement::Statement)
//! and [`Command`](statement::Command) trees, and the in-memory
//! [`DataSet`](dataset::DataSet).
//!
//! Nothing here knows about SQL text. Trees are built once, shared through
//! `Arc`, and rendered by a dialect generator.
//!
//! ## Module Overview
//!
//! - [`value`] - The backend-agnostic [`Value`](value::Value) enum
//! - [`column`] - Columns and logical value types
//! - [`model`] - Models, row sources, and ids
//! - [`constraints`] - Primary keys, UNIQUE/CHECK/FOREIGN KEY constraints, indexes
//! - [`expr`] - Expressions, parameters, and function keys
//! - [`statement`] - Queries and DML commands
//! - [`dataset`] - In-memory rows with identity bookkeeping

// These clippy lints are intentionally allowed for the IR crate:
// - should_implement_trait: eq/gt/from builder methods return trees, not bools
// - return_self_not_must_use: builder pattern methods are self-documenting
// - use_self: explicit type names are clearer inside macro-generated impls
// - doc_markdown: backtick requirements for documentation items are too strict
#![allow(clippy::should_implement_trait)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::use_self)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::result_large_err)]

pub mod column;
pub mod constraints;
pub mod dataset;
pub mod expr;
pub mod model;
pub mod statement;
pub mod value;

// Re-export the most commonly used types at the crate root.
pub use column::{Column, ColumnId, EnumStorage, Identity, ValueType};
pub use constraints::{
    CheckConstraint, Constraint, ForeignKey, ForeignKeyRule, Index, KeyColumns, PrimaryKey,
    UniqueConstraint,
};
pub use dataset::{DataRow, DataSet};
pub use expr::{BinaryKind, ColumnRef, Expr, FunctionKey, Param, ParamCell, UnaryKind};
pub use model::{Model, ModelId, RowSource, SortDirection};
pub use statement::{
    ColumnMapping, Command, CommandTree, DeleteStatement, InsertScalarStatement, InsertStatement,
    JoinKind, JoinStatement, OrderBy, SelectStatement, Statement, StatementId, UnionKind,
    UnionStatement, UpdateStatement,
};
pub use value::Value;
