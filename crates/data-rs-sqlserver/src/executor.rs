//! The execution contract.
//!
//! The engine never talks to a wire driver directly. It hands a
//! [`DbCommand`] (SQL text plus bound [`SqlParameter`]s) to a
//! [`DbExecutor`], which a thin shim over the actual driver implements.
//! Every call carries a [`CancellationToken`].

use std::time::Duration;

use async_trait::async_trait;
use data_rs_core::DataResult;
use data_rs_db::Value;
use tokio_util::sync::CancellationToken;

use crate::codec::{to_native, NativeValue};
use crate::row::Row;
use crate::sql_type::{ParameterDirection, SqlParameterInfo, SqlType};

/// A bound parameter as handed to the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParameter {
    pub name: String,
    pub info: SqlParameterInfo,
    pub direction: ParameterDirection,
    pub nullable: bool,
    pub value: NativeValue,
}

impl SqlParameter {
    /// Binds `value` as an input parameter of `sql_type`.
    pub fn input(name: impl Into<String>, sql_type: &SqlType, value: &Value) -> DataResult<Self> {
        Ok(Self {
            name: name.into(),
            info: sql_type.parameter_info(),
            direction: ParameterDirection::Input,
            nullable: true,
            value: to_native(sql_type, value)?,
        })
    }

    /// Declares an output parameter of `sql_type`.
    pub fn output(name: impl Into<String>, sql_type: &SqlType) -> Self {
        Self {
            name: name.into(),
            info: sql_type.parameter_info(),
            direction: ParameterDirection::Output,
            nullable: true,
            value: NativeValue::DbNull,
        }
    }
}

/// SQL text with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DbCommand {
    pub sql: String,
    pub params: Vec<SqlParameter>,
    pub timeout: Option<Duration>,
}

impl DbCommand {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_params(mut self, params: Vec<SqlParameter>) -> Self {
        self.params = params;
        self
    }

    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Minimal async database executor.
///
/// Driver failures are reported as
/// [`DataError::DatabaseError`](data_rs_core::DataError::DatabaseError) and
/// propagated unchanged by the engine.
#[async_trait]
pub trait DbExecutor: Send + Sync {
    /// Runs a command that returns no rows; returns the affected count.
    async fn execute_non_query(
        &self,
        command: &DbCommand,
        cancel: &CancellationToken,
    ) -> DataResult<u64>;

    /// Runs a command and returns every result row.
    async fn execute_reader(
        &self,
        command: &DbCommand,
        cancel: &CancellationToken,
    ) -> DataResult<Vec<Row>>;

    /// Runs a command and returns the first column of the first row.
    async fn execute_scalar(
        &self,
        command: &DbCommand,
        cancel: &CancellationToken,
    ) -> DataResult<Option<NativeValue>> {
        let rows = self.execute_reader(command, cancel).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.native_at(0).cloned()))
    }
}
