//! Engine error types

use thiserror::Error;

/// Errors raised by a storage engine.
///
/// These are the raw failures of the underlying engine. The registry and
/// table layers wrap them into [`crate::Error::Connection`] or
/// [`crate::Error::Transaction`] depending on where they happened.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The engine is not available in this environment
    #[error("storage engine not available: {0}")]
    NotAvailable(String),

    /// Database open/upgrade failed
    #[error("open failed: {0}")]
    Open(String),

    /// Requested version is below the database's current version
    #[error("requested version {requested} is less than current version {current}")]
    Version { requested: u32, current: u32 },

    /// Version upgrade cannot proceed while other connections are open
    #[error("upgrade blocked by {0} open connection(s)")]
    Blocked(usize),

    /// The connection does not declare this object store
    #[error("object store not found: {0}")]
    StoreNotFound(String),

    /// The connection has been closed
    #[error("connection is closed")]
    Closed,

    /// `add` hit an existing key
    #[error("key already exists: {0}")]
    Constraint(String),

    /// Key is not usable by the engine (e.g. NaN)
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Transaction aborted
    #[error("transaction aborted: {0}")]
    Transaction(String),

    /// Individual request failed
    #[error("request failed: {0}")]
    Request(String),

    /// Value could not be converted to or from the engine's representation
    #[error("value conversion failed: {0}")]
    Conversion(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
