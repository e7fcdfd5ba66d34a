//! # data-rs-sqlserver
//!
//! The SQL Server (T-SQL) engine for data-rs. Walks statement trees from
//! `data-rs-db` and emits parameterized T-SQL, creates tables and temp
//! tables, runs bulk inserts with identity propagation, and decodes result
//! rows back into typed data sets.
//!
//! ## Module Overview
//!
//! - [`version`] - Dialect version tags (`Sql13`, `Sql14`)
//! - [`sql_type`] - SQL type descriptors with validated facets
//! - [`mapper`] - Logical type to SQL type mapping with per-column overrides
//! - [`codec`] - Literal rendering, native conversion, and literal parsing
//! - [`unique_name`] - Deterministic suffixing for aliases and temp tables
//! - [`temp_table`] - Session temp table naming
//! - [`alias`] - Table alias assignment per generation pass
//! - [`writer`] - Indented SQL text builder
//! - [`expression`] - Expression rendering and parameter collection
//! - [`generator`] - SELECT/INSERT/UPDATE/DELETE rendering
//! - [`ddl`] - CREATE TABLE and DROP TABLE rendering
//! - [`json_rowset`] - Data sets shipped as one `OPENJSON` parameter
//! - [`row`] - Result rows and typed accessors
//! - [`executor`] - The driver contract
//! - [`transaction`] - Transaction and savepoint bookkeeping
//! - [`session`] - Per-connection caches, temp tables, and transactions
//! - [`identity`] - Bulk insert with identity propagation

// These clippy lints are intentionally allowed for the dialect crate:
// - doc_markdown: T-SQL keywords in docs do not need backticks
// - too_many_lines: statement writers follow the clause order of the dialect
// - cast_possible_truncation: facet values are range-checked before casting
// - missing_const_for_fn: accessors stay non-const for API stability
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::result_large_err)]
#![allow(clippy::significant_drop_tightening)]

pub mod alias;
pub mod codec;
pub mod ddl;
pub mod executor;
pub mod expression;
pub mod generator;
pub mod identity;
pub mod json_rowset;
pub mod mapper;
pub mod row;
pub mod session;
pub mod sql_type;
pub mod temp_table;
pub mod transaction;
pub mod unique_name;
pub mod version;
pub mod writer;

pub use codec::{parse_literal, render_literal, NativeValue};
pub use ddl::DdlGenerator;
pub use executor::{DbCommand, DbExecutor, SqlParameter};
pub use generator::{SqlGenerator, SqlText};
pub use identity::{BulkInsert, BulkInsertOutcome, IdentityStep};
pub use mapper::TypeMapper;
pub use row::{FromNative, Row};
pub use session::SqlSession;
pub use sql_type::{ParameterDirection, SqlDbType, SqlParameterInfo, SqlType};
pub use transaction::{IsolationLevel, TransactionHandle};
pub use version::SqlVersion;
