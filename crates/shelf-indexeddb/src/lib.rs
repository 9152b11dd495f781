//! IndexedDB engine for shelf tables (browser WASM)
//!
//! Implements the `shelf_core` [`Engine`](shelf_core::Engine) and
//! [`Connection`](shelf_core::Connection) traits on top of the browser's
//! IndexedDB, so a `shelf_core::Database` runs unchanged in the browser.
//!
//! # Schema
//!
//! Each table is one object store created with `autoIncrement: true` and no
//! key path, so records are stored out-of-line. Values are stored as plain
//! structured-clone data; blob leaves become native `Blob`s.
//!
//! # Example
//!
//! ```rust,ignore
//! use shelf_core::{Database, Key, Value};
//! use shelf_indexeddb::IndexedDbEngine;
//!
//! let db = Database::new(IndexedDbEngine::new(), "app")?;
//! let users = db.table("users");
//! users.set(Some(Key::from(1)), Value::from("Alice")).await?;
//! assert_eq!(users.get(1).await?, Some(Value::from("Alice")));
//! ```

pub mod convert;
pub mod engine;
pub mod error;
pub mod idb;

pub use engine::{IndexedDbConnection, IndexedDbEngine};
pub use error::{IndexedDbError, Result};
