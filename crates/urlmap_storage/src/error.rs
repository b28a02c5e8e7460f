//! Error types for store operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to an index store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file could not be created or opened.
    #[error("cannot open store at {path}: {message}")]
    Open {
        /// Path that was being opened.
        path: PathBuf,
        /// Description of the underlying failure.
        message: String,
    },

    /// A statement failed to prepare or execute.
    #[error("statement failed: {message}")]
    Query {
        /// Description of the failure.
        message: String,
    },

    /// A statement violated a schema constraint (duplicate key,
    /// foreign-key reference, check constraint).
    #[error("constraint violated: {message}")]
    Constraint {
        /// Description of the violated constraint.
        message: String,
    },

    /// A result row did not contain the requested column.
    #[error("missing column: {column}")]
    MissingColumn {
        /// The column that was requested.
        column: String,
    },

    /// A result column held a value of an unexpected type.
    #[error("column {column} is not {expected}")]
    ColumnType {
        /// The column that was read.
        column: String,
        /// The type the caller asked for.
        expected: &'static str,
    },
}

impl StoreError {
    /// Creates an open error.
    pub fn open(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Open {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Creates a constraint error.
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            message: message.into(),
        }
    }
}
