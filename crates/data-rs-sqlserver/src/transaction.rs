//! Transaction and savepoint bookkeeping.
//!
//! The first `begin` opens a real transaction; nested begins create
//! savepoints. Only the innermost (current) handle may commit or roll back.
//! Committing a savepoint just pops it; committing the root commits the
//! transaction. Rolling back a savepoint rolls back to it; rolling back the
//! root ends the transaction. Resolved handles are frozen: any later use
//! fails with [`DataError::TransactionError`].
//!
//! [`TransactionStack`] only decides which SQL to send. The session runs it.

use data_rs_core::{DataError, DataResult};
use tracing::warn;

use crate::codec::quote_identifier;

/// Transaction isolation levels supported by SQL Server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
}

impl IsolationLevel {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Snapshot => "SNAPSHOT",
            Self::Serializable => "SERIALIZABLE",
        }
    }

    /// Returns the full `SET TRANSACTION ISOLATION LEVEL` statement.
    pub fn set_sql(self) -> String {
        format!("SET TRANSACTION ISOLATION LEVEL {};", self.as_sql())
    }
}

/// A caller's handle on one level of the transaction stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionHandle {
    id: u64,
    savepoint: Option<String>,
}

impl TransactionHandle {
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The savepoint name for nested handles; `None` for the root.
    pub fn savepoint(&self) -> Option<&str> {
        self.savepoint.as_deref()
    }

    pub const fn is_root(&self) -> bool {
        self.savepoint.is_none()
    }
}

/// The open transaction levels of one session, innermost last.
#[derive(Debug, Default, Clone)]
pub struct TransactionStack {
    open: Vec<TransactionHandle>,
    next_id: u64,
    next_savepoint: u64,
}

impl TransactionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn is_active(&self) -> bool {
        !self.open.is_empty()
    }

    pub fn current(&self) -> Option<&TransactionHandle> {
        self.open.last()
    }

    /// Opens a level and returns its handle plus the SQL to run.
    pub fn begin(
        &mut self,
        isolation: Option<IsolationLevel>,
    ) -> DataResult<(TransactionHandle, Vec<String>)> {
        self.next_id += 1;
        let mut sql = Vec::new();
        let savepoint = if self.open.is_empty() {
            if let Some(level) = isolation {
                sql.push(level.set_sql());
            }
            sql.push("BEGIN TRANSACTION;".to_string());
            None
        } else {
            if let Some(level) = isolation {
                return Err(DataError::TransactionError(format!(
                    "isolation level {} can only be set on the outermost transaction",
                    level.as_sql()
                )));
            }
            self.next_savepoint += 1;
            let name = format!("sp_{}", self.next_savepoint);
            sql.push(format!("SAVE TRANSACTION {};", quote_identifier(&name)));
            Some(name)
        };
        let handle = TransactionHandle {
            id: self.next_id,
            savepoint,
        };
        self.open.push(handle.clone());
        Ok((handle, sql))
    }

    /// Fails unless `handle` is the innermost open level.
    pub fn ensure_current(&self, handle: &TransactionHandle) -> DataResult<()> {
        match self.open.iter().position(|h| h.id == handle.id) {
            None => Err(DataError::TransactionError(format!(
                "transaction {} has already been resolved",
                handle.id
            ))),
            Some(pos) if pos + 1 != self.open.len() => Err(DataError::TransactionError(format!(
                "transaction {} is not the current transaction (depth {} of {})",
                handle.id,
                pos + 1,
                self.open.len()
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Resolves `handle` as committed. Returns the SQL to run, if any.
    pub fn commit(&mut self, handle: &TransactionHandle) -> DataResult<Option<String>> {
        self.ensure_current(handle)?;
        self.open.pop();
        Ok(handle
            .is_root()
            .then(|| "COMMIT TRANSACTION;".to_string()))
    }

    /// Resolves `handle` as rolled back. Returns the SQL to run.
    pub fn rollback(&mut self, handle: &TransactionHandle) -> DataResult<String> {
        self.ensure_current(handle)?;
        self.open.pop();
        Ok(match handle.savepoint() {
            Some(name) => format!("ROLLBACK TRANSACTION {};", quote_identifier(name)),
            None => "ROLLBACK TRANSACTION;".to_string(),
        })
    }

    /// Rolls back the whole transaction regardless of depth, freezing every
    /// open handle. Returns `None` when no transaction is open.
    pub fn abort(&mut self) -> Option<String> {
        if self.open.is_empty() {
            return None;
        }
        let discarded = self.open.len() - 1;
        if discarded > 0 {
            warn!(
                savepoints = discarded,
                "rolling back the root transaction discards open savepoints"
            );
        }
        self.open.clear();
        Some("ROLLBACK TRANSACTION;".to_string())
    }
}
