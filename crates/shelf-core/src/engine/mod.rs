//! Storage engine abstraction
//!
//! This module defines the `Engine` and `Connection` traits the registry and
//! table layers are written against. Implementations exist for:
//!
//! - **Memory**: In-process engine for testing (`MemoryEngine`)
//! - **IndexedDB**: Browser storage via web-sys (separate crate, WASM only)
//!
//! The traits model the parts of a versioned key-value engine the table
//! lifecycle depends on: opening at a version, a structural-change callback
//! that only runs on a version increase, and per-store transactions.
//!
//! # Example
//!
//! ```rust
//! use shelf_core::engine::{Connection, Engine, MemoryEngine, Upgrade};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let engine = MemoryEngine::new();
//! let conn = engine
//!     .open("app", None, Upgrade::CreateStore("notes".into()))
//!     .await
//!     .unwrap();
//! assert_eq!(conn.version(), 1);
//! assert!(conn.contains_store("notes"));
//! # });
//! ```

mod error;
mod memory;
mod traits;

pub use error::{EngineError, EngineResult};
pub use memory::{MemoryConnection, MemoryEngine};
pub use traits::{Connection, Engine, Record, Upgrade};
