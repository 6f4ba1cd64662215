//! Error types for schema construction.

use thiserror::Error;

/// Errors produced while building or comparing schemas.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("invalid table name prefix {0:?}: use ASCII letters, digits and underscores")]
    InvalidPrefix(String),

    #[error("table {0} is defined twice")]
    DuplicateTable(String),

    #[error("column {column} is defined twice in table {table}")]
    DuplicateColumn { table: String, column: String },

    /// A key or index names a column the table does not have.
    #[error("table {table} has no column {column}")]
    UnknownColumn { table: String, column: String },

    #[error("schema introspection failed: {0}")]
    Introspection(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Convenience alias for schema results.
pub type SchemaResult<T> = Result<T, SchemaError>;
