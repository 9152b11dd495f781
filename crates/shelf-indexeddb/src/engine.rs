//! IndexedDB implementation of the shelf engine traits.
//!
//! Blob values are read only after the transaction has completed: reading a
//! `Blob` awaits a promise, and an IndexedDB transaction commits as soon as
//! control returns to the event loop with no pending requests.

use async_trait::async_trait;
use shelf_core::{Connection, Engine, EngineError, EngineResult, Key, Record, Upgrade, Value};
use wasm_bindgen::JsValue;
use web_sys::{IdbDatabase, IdbTransactionMode};

use crate::convert::{js_to_key, js_to_value, key_to_js, value_to_js};
use crate::error::IndexedDbError;
use crate::idb;

/// The browser's global IndexedDB factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedDbEngine;

impl IndexedDbEngine {
    pub fn new() -> Self {
        Self
    }

    /// Fails with [`IndexedDbError::NotAvailable`] outside a browser-like global.
    pub fn check_available() -> crate::Result<()> {
        idb::idb_factory().map(|_| ())
    }
}

#[async_trait(?Send)]
impl Engine for IndexedDbEngine {
    type Connection = IndexedDbConnection;

    async fn open(
        &self,
        name: &str,
        version: Option<u32>,
        upgrade: Upgrade,
    ) -> EngineResult<IndexedDbConnection> {
        let db = idb::open_database(name, version, upgrade).await?;
        Ok(IndexedDbConnection { db })
    }

    async fn delete_database(&self, name: &str) -> EngineResult<()> {
        idb::delete_database(name).await?;
        Ok(())
    }
}

/// An open `IDBDatabase`. Clones share the handle.
#[derive(Debug, Clone)]
pub struct IndexedDbConnection {
    db: IdbDatabase,
}

impl IndexedDbConnection {
    pub fn database(&self) -> &IdbDatabase {
        &self.db
    }
}

fn valid_key(key: &Key) -> EngineResult<JsValue> {
    if !key.is_valid() {
        return Err(EngineError::InvalidKey(key.to_string()));
    }
    Ok(key_to_js(key))
}

fn request_error(op: &str, e: JsValue) -> IndexedDbError {
    IndexedDbError::Request(format!("IDB {}: {}", op, idb::js_message(&e)))
}

#[async_trait(?Send)]
impl Connection for IndexedDbConnection {
    fn version(&self) -> u32 {
        self.db.version() as u32
    }

    fn store_names(&self) -> Vec<String> {
        idb::store_names(&self.db)
    }

    fn contains_store(&self, store: &str) -> bool {
        self.db.object_store_names().contains(store)
    }

    fn close(&self) {
        self.db.close();
    }

    async fn add(&self, store: &str, value: Value) -> EngineResult<Key> {
        let js_val = value_to_js(&value)?;

        let (tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readwrite)?;
        let req = object_store
            .add(&js_val)
            .map_err(|e| request_error("add", e))?;
        let key = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;

        Ok(js_to_key(&key)?)
    }

    async fn put(&self, store: &str, key: Key, value: Value) -> EngineResult<Key> {
        let js_key = valid_key(&key)?;
        let js_val = value_to_js(&value)?;

        let (tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readwrite)?;
        let req = object_store
            .put_with_key(&js_val, &js_key)
            .map_err(|e| request_error("put", e))?;
        idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;

        Ok(key)
    }

    async fn get(&self, store: &str, key: &Key) -> EngineResult<Option<Value>> {
        let js_key = valid_key(key)?;

        let (tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readonly)?;
        let req = object_store
            .get(&js_key)
            .map_err(|e| request_error("get", e))?;
        let result = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;

        // missing keys read as undefined; a stored null is a value
        if result.is_undefined() {
            return Ok(None);
        }
        Ok(Some(js_to_value(result).await?))
    }

    async fn delete(&self, store: &str, key: &Key) -> EngineResult<()> {
        let js_key = valid_key(key)?;

        let (tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readwrite)?;
        let req = object_store
            .delete(&js_key)
            .map_err(|e| request_error("delete", e))?;
        idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;
        Ok(())
    }

    async fn clear(&self, store: &str) -> EngineResult<()> {
        let (tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readwrite)?;
        let req = object_store
            .clear()
            .map_err(|e| request_error("clear", e))?;
        idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;
        Ok(())
    }

    async fn scan(&self, store: &str) -> EngineResult<Vec<Record>> {
        let (tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readonly)?;
        let rows = idb::collect_cursor(&object_store).await?;
        idb::await_transaction(&tx).await?;

        let mut records = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            records.push(Record {
                key: js_to_key(&key)?,
                value: js_to_value(value).await?,
            });
        }
        Ok(records)
    }

    async fn replace_all(&self, store: &str, records: Vec<Record>) -> EngineResult<()> {
        let rows = records
            .iter()
            .map(|record| Ok((valid_key(&record.key)?, value_to_js(&record.value)?)))
            .collect::<EngineResult<Vec<_>>>()?;

        let (tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readwrite)?;
        object_store
            .clear()
            .map_err(|e| request_error("clear", e))?;
        for (js_key, js_val) in &rows {
            // A failing request aborts the transaction, which await_transaction reports.
            if let Err(e) = object_store.put_with_key(js_val, js_key) {
                let _ = tx.abort();
                return Err(request_error("put", e).into());
            }
        }
        idb::await_transaction(&tx).await?;
        Ok(())
    }
}
