//! # data-rs
//!
//! A typed relational data-access layer with a T-SQL generation engine.
//!
//! This is the meta-crate that re-exports the sub-crates for convenient
//! access. Depend on `data-rs` to get everything, or on the individual crates
//! for finer-grained control.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use data_rs::prelude::*;
//!
//! let mut product = Model::new("Product");
//! let name = product.add_column(Column::new("Name", ValueType::String));
//! let product = Arc::new(product);
//!
//! let select = SelectStatement::new(&product)
//!     .column(product.col(&name), &name)
//!     .from(Statement::table(&product))
//!     .fetch(10);
//! let mapper = TypeMapper::new();
//! let temps = TempTableNames::new();
//! let text = SqlGenerator::new(&mapper, SqlVersion::Sql14, &temps)
//!     .generate(&Command::Select(select.into_statement()))
//!     .unwrap();
//! assert!(text.sql().ends_with("OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY;"));
//! ```

/// Error types, settings, and logging setup.
pub use data_rs_core as core;

/// The relational IR: values, columns, models, expressions, statements.
pub use data_rs_db as db;

/// The SQL Server engine: generators, codec, sessions, identity propagation.
#[cfg(feature = "sqlserver")]
pub use data_rs_sqlserver as sqlserver;

/// Re-exports of third-party crates.
pub use async_trait;
pub use tokio;
pub use tokio_util;
pub use tracing;

/// Commonly used types in one import.
pub mod prelude {
    pub use data_rs_core::{DataError, DataResult, DatabaseSettings, Settings};
    pub use data_rs_db::{
        Column, ColumnMapping, Command, CommandTree, Constraint, DataSet, Expr, ForeignKey,
        JoinKind, Model, OrderBy, Param, ParamCell, PrimaryKey, SelectStatement, SortDirection,
        Statement, Value, ValueType,
    };

    #[cfg(feature = "sqlserver")]
    pub use data_rs_sqlserver::{
        temp_table::TempTableNames, BulkInsert, DbExecutor, IsolationLevel, SqlGenerator,
        SqlSession, SqlType, SqlVersion, TypeMapper,
    };
}
