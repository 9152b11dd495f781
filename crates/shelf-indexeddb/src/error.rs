//! Error types for the IndexedDB engine

use shelf_core::EngineError;
use thiserror::Error;

/// Result type for IndexedDB operations
pub type Result<T> = std::result::Result<T, IndexedDbError>;

/// Errors that can occur during IndexedDB operations
#[derive(Debug, Error)]
pub enum IndexedDbError {
    /// IndexedDB is not available in this environment
    #[error("IndexedDB not available: {0}")]
    NotAvailable(String),

    /// Database open error
    #[error("IndexedDB open error: {0}")]
    Open(String),

    /// Structural change inside `upgradeneeded` failed
    #[error("IndexedDB upgrade error: {0}")]
    Upgrade(String),

    /// Transaction error or abort
    #[error("IndexedDB transaction error: {0}")]
    Transaction(String),

    /// Request error from IDB operation
    #[error("IndexedDB request error: {0}")]
    Request(String),

    /// Key is not a number, Date or string
    #[error("unsupported key: {0}")]
    UnsupportedKey(String),

    /// JavaScript value conversion error
    #[error("JS conversion error: {0}")]
    JsValue(String),
}

impl From<wasm_bindgen::JsValue> for IndexedDbError {
    fn from(val: wasm_bindgen::JsValue) -> Self {
        let msg = js_sys::JSON::stringify(&val)
            .map(String::from)
            .unwrap_or_else(|_| format!("{:?}", val));
        IndexedDbError::Request(msg)
    }
}

/// Convert IndexedDbError to EngineError for the engine trait
impl From<IndexedDbError> for EngineError {
    fn from(err: IndexedDbError) -> Self {
        match err {
            IndexedDbError::NotAvailable(msg) => EngineError::NotAvailable(msg),
            IndexedDbError::Open(msg) => EngineError::Open(msg),
            IndexedDbError::Upgrade(msg) => EngineError::Open(format!("upgrade: {}", msg)),
            IndexedDbError::Transaction(msg) => EngineError::Transaction(msg),
            IndexedDbError::Request(msg) => EngineError::Request(msg),
            IndexedDbError::UnsupportedKey(msg) => EngineError::InvalidKey(msg),
            IndexedDbError::JsValue(msg) => EngineError::Conversion(msg),
        }
    }
}
