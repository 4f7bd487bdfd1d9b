//! Storage error types.

use thiserror::Error;

/// Errors raised by a storage engine.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Table not found.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Table already exists.
    #[error("Table already exists: {0}")]
    TableExists(String),

    /// Column not found in the target table.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Duplicate column name in a table definition.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// An index already exists on the column.
    #[error("Index already exists on column: {0}")]
    IndexExists(String),

    /// Primary key value already present.
    #[error("Duplicate primary key: {0}")]
    DuplicateKey(String),

    /// A value does not parse as the column's declared type.
    #[error("type mismatch for column {column}: {value:?}")]
    TypeMismatch {
        /// Target column.
        column: String,
        /// Offending value text.
        value: String,
    },

    /// A row carries the wrong number of fields.
    #[error("row arity mismatch: expected {expected}, got {got}")]
    ArityMismatch {
        /// Schema width.
        expected: usize,
        /// Supplied width.
        got: usize,
    },

    /// Range endpoints name different columns.
    #[error("invalid key range: {0}")]
    InvalidRange(String),

    /// I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV ingestion failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
