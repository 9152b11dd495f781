//! Engine trait definitions

use async_trait::async_trait;

use crate::engine::error::EngineResult;
use crate::key::Key;
use crate::value::Value;

/// Structural change applied inside the engine's upgrade callback.
///
/// The callback only runs when the open request raises the version (or the
/// database did not exist yet). Both store changes are idempotent: creating
/// a store that exists, or deleting one that doesn't, does nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upgrade {
    None,
    /// Declare the store with an auto-increment key generator.
    CreateStore(String),
    DeleteStore(String),
}

/// A key/value pair read from a store.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: Key,
    pub value: Value,
}

impl Record {
    pub fn new(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A versioned key-value database engine.
///
/// Engines are single-threaded: futures are `!Send`, matching the browser
/// environment the IndexedDB engine runs in.
#[async_trait(?Send)]
pub trait Engine {
    type Connection: Connection;

    /// Open the database `name`.
    ///
    /// With `version == None` the database opens at its current version
    /// (version 1 if it does not exist yet). `upgrade` is applied only if the
    /// open raises the version.
    async fn open(
        &self,
        name: &str,
        version: Option<u32>,
        upgrade: Upgrade,
    ) -> EngineResult<Self::Connection>;

    /// Delete the database and everything in it.
    async fn delete_database(&self, name: &str) -> EngineResult<()>;
}

/// An open connection to one database.
///
/// Clones refer to the same underlying connection; closing one closes all.
/// Every data operation runs in its own transaction on a single store.
#[async_trait(?Send)]
pub trait Connection: Clone {
    /// Version the connection was opened at.
    fn version(&self) -> u32;

    /// Stores declared when the connection was opened, sorted.
    fn store_names(&self) -> Vec<String>;

    fn contains_store(&self, store: &str) -> bool {
        self.store_names().iter().any(|s| s == store)
    }

    fn close(&self);

    /// Insert with an engine-assigned key. Returns the key.
    async fn add(&self, store: &str, value: Value) -> EngineResult<Key>;

    /// Create or overwrite the record at `key`. Returns the key.
    async fn put(&self, store: &str, key: Key, value: Value) -> EngineResult<Key>;

    async fn get(&self, store: &str, key: &Key) -> EngineResult<Option<Value>>;

    /// Remove the record at `key`. Absent keys are not an error.
    async fn delete(&self, store: &str, key: &Key) -> EngineResult<()>;

    async fn clear(&self, store: &str) -> EngineResult<()>;

    /// Every record in ascending key order, read in one transaction.
    async fn scan(&self, store: &str) -> EngineResult<Vec<Record>>;

    /// Clear the store and write `records` in one transaction. Resolves after
    /// the transaction commits.
    async fn replace_all(&self, store: &str, records: Vec<Record>) -> EngineResult<()>;
}
