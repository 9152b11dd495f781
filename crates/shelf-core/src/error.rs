//! Error types for table operations

use thiserror::Error;

use crate::engine::EngineError;

/// Result type for table operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of [`crate::Database`] and [`crate::Table`].
#[derive(Debug, Error)]
pub enum Error {
    /// Database name rejected at construction
    #[error("invalid database name: {0:?}")]
    InvalidName(String),

    /// Table name rejected before touching storage
    #[error("invalid table name: {0:?}")]
    InvalidTable(String),

    /// Opening or upgrading the database failed. The registry holds no open
    /// connection afterwards.
    #[error("connection to database '{database}' failed: {source}")]
    Connection {
        database: String,
        source: EngineError,
    },

    /// A single read/write transaction failed
    #[error("{op} on table '{table}' failed: {source}")]
    Transaction {
        table: String,
        op: &'static str,
        source: EngineError,
    },

    /// Malformed backup payload
    #[error("invalid backup format: {0}")]
    Format(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn connection(database: &str, source: EngineError) -> Self {
        Error::Connection {
            database: database.to_string(),
            source,
        }
    }

    pub(crate) fn transaction(table: &str, op: &'static str, source: EngineError) -> Self {
        Error::Transaction {
            table: table.to_string(),
            op,
            source,
        }
    }

    /// The underlying engine error, if any.
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            Error::Connection { source, .. } | Error::Transaction { source, .. } => Some(source),
            _ => None,
        }
    }
}
