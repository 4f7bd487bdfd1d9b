//! Executor-level errors and their response codes.

use thiserror::Error;

use crate::parser::ParseError;
use crate::storage::StorageError;

/// Errors surfaced through a session response.
#[derive(Debug, Error)]
pub enum Error {
    /// Grammar or lowering rejection.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Named table is not known to the engine.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Named column is absent in the target table.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// A statement that parsed but cannot be executed as written.
    #[error("invalid statement: {0}")]
    Invalid(String),

    /// Anything the engine raised.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Error {
    /// The HTTP-like status code carried in the session response.
    pub fn code(&self) -> u16 {
        match self {
            Error::Parse(_) | Error::Invalid(_) => 400,
            Error::TableNotFound(_) | Error::ColumnNotFound(_) => 404,
            Error::Storage(StorageError::TableNotFound(_))
            | Error::Storage(StorageError::ColumnNotFound(_)) => 404,
            Error::Storage(_) => 500,
        }
    }
}

/// Result type for executor operations.
pub type Result<T> = std::result::Result<T, Error>;
