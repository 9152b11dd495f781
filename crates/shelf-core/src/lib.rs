//! Shelf Core
//!
//! Named tables over a versioned key-value engine, designed to run
//! identically in the browser (WASM, backed by IndexedDB) and natively
//! (backed by the in-memory engine).
//!
//! Tables are schema-less and created on first use. The engine only allows a
//! store to be created during a version upgrade, so the [`registry`] opens,
//! upgrades and reconnects the single database connection as different
//! tables are used. The [`table`] façade re-resolves that connection on every
//! call.
//!
//! # Example
//!
//! ```rust
//! use shelf_core::{Database, Key, MemoryEngine, Value};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let db = Database::new(MemoryEngine::new(), "app").unwrap();
//! let users = db.table("users");
//!
//! users.set(Some(Key::from(1)), Value::from("Alice")).await.unwrap();
//! let bob = users.set(Some(Key::from("auto")), Value::from("Bob")).await.unwrap();
//! assert_eq!(bob, Key::from(2));
//!
//! let backup = db.export_json().await.unwrap();
//! let copy = Database::new(MemoryEngine::new(), "copy").unwrap();
//! copy.import_json(&backup).await.unwrap();
//! assert_eq!(copy.table("users").get(2).await.unwrap(), Some(Value::from("Bob")));
//! # });
//! ```

pub mod backup;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod key;
pub mod registry;
pub mod table;
pub mod value;

// Re-export main types at crate root
pub use config::{DatabaseConfig, DEFAULT_BACKUP_NAME};
pub use database::Database;
pub use engine::{
    Connection, Engine, EngineError, EngineResult, MemoryConnection, MemoryEngine, Record, Upgrade,
};
pub use error::{Error, Result};
pub use key::Key;
pub use registry::Registry;
pub use table::{Table, AUTO_KEY};
pub use value::{Blob, Value, Visitor};
