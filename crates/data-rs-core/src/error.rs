//! Core error types for data-rs.
//!
//! [`DataError`] covers configuration failures (type facets out of range),
//! unsupported constructs, malformed statement trees, transaction discipline,
//! driver errors, and cancellation. Every message names the offending key,
//! type, or parameter.

use thiserror::Error;

/// The primary error type for data-rs.
#[derive(Error, Debug)]
pub enum DataError {
    // ── Configuration ────────────────────────────────────────────────

    /// A type facet (size, precision, scale) is outside its declared bounds.
    #[error("Argument out of range: {0}")]
    ArgumentOutOfRange(String),

    /// A settings value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Generation ───────────────────────────────────────────────────

    /// The engine does not support a function key, type, or dialect version.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// The statement tree is malformed (missing alias, bad arity, etc.).
    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    // ── Execution ────────────────────────────────────────────────────

    /// A transaction handle was used out of order or after it was resolved.
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// An error reported by the database driver.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// The operation observed a cancellation request.
    #[error("Operation cancelled")]
    Cancelled,

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DataError {
    /// Returns `true` for errors that indicate an engine/IR mismatch rather
    /// than a runtime condition. These are never worth retrying.
    pub const fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Self::ArgumentOutOfRange(_) | Self::NotSupported(_) | Self::InvalidStatement(_)
        )
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience type alias for `Result<T, DataError>`.
pub type DataResult<T> = Result<T, DataError>;
