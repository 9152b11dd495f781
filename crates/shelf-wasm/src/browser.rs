//! `TableDb` and `Table` classes for JavaScript
//!
//! Methods that touch IndexedDB return a `Promise`. The futures behind them
//! hold their own `Rc` clones, so a JS object may be garbage-collected while
//! one of its operations is still running.

use std::rc::Rc;

use js_sys::{Array, Object, Promise, Reflect};
use shelf_core::{Database, DatabaseConfig, Record, Table};
use shelf_indexeddb::convert::{js_to_optional_key, js_to_value, key_to_js, value_to_js};
use shelf_indexeddb::IndexedDbEngine;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::download::trigger_download;

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// A named IndexedDB database of schema-less tables.
#[wasm_bindgen]
pub struct TableDb {
    inner: Rc<Database<IndexedDbEngine>>,
}

#[wasm_bindgen]
impl TableDb {
    /// Create a handle for database `name`. Nothing is opened until the
    /// first table operation.
    #[wasm_bindgen(constructor)]
    pub fn new(name: &str) -> Result<TableDb, JsValue> {
        Self::with(DatabaseConfig::new(name))
    }

    /// Create from a JSON config:
    /// `{"name": "app", "backup_file_name": "app_backup", "pretty_export": false}`.
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(json: &str) -> Result<TableDb, JsValue> {
        let config = DatabaseConfig::from_json(json).map_err(js_error)?;
        Self::with(config)
    }

    fn with(config: DatabaseConfig) -> Result<TableDb, JsValue> {
        // Route Rust panics to console.error instead of "RuntimeError: unreachable"
        console_error_panic_hook::set_once();

        let db = Database::with_config(IndexedDbEngine::new(), config).map_err(js_error)?;
        Ok(TableDb { inner: Rc::new(db) })
    }

    #[wasm_bindgen(getter)]
    pub fn name(&self) -> String {
        self.inner.name().to_string()
    }

    /// The table façade for `name`. The same underlying table is returned for
    /// repeated calls.
    pub fn table(&self, name: &str) -> JsTable {
        JsTable {
            inner: self.inner.table(name),
        }
    }

    /// Delete table `name` and all its records. Resolves to `true`.
    #[wasm_bindgen(js_name = drop)]
    pub fn drop_table(&self, name: String) -> Promise {
        let db = self.inner.clone();
        future_to_promise(async move {
            db.drop_table(&name).await.map_err(js_error)?;
            Ok(JsValue::TRUE)
        })
    }

    /// Resolves to the sorted list of existing table names.
    #[wasm_bindgen(js_name = tableNames)]
    pub fn table_names(&self) -> Promise {
        let db = self.inner.clone();
        future_to_promise(async move {
            let names = db.table_names().await.map_err(js_error)?;
            Ok(names.into_iter().map(JsValue::from).collect::<Array>().into())
        })
    }

    /// Resolves to the backup JSON text.
    #[wasm_bindgen(js_name = exportJson)]
    pub fn export_json(&self) -> Promise {
        let db = self.inner.clone();
        future_to_promise(async move {
            let json = db.export_json().await.map_err(js_error)?;
            Ok(JsValue::from(json))
        })
    }

    /// Export and offer the backup as `<filename>.json`.
    pub fn download(&self, filename: Option<String>) -> Promise {
        let db = self.inner.clone();
        future_to_promise(async move {
            let json = db.export_json().await.map_err(js_error)?;
            let file_name = db.backup_file_name(filename.as_deref());
            trigger_download(&file_name, &json)?;
            Ok(JsValue::from(file_name))
        })
    }

    /// Replace the tables named in `json` with its records.
    #[wasm_bindgen(js_name = importJson)]
    pub fn import_json(&self, json: String) -> Promise {
        let db = self.inner.clone();
        future_to_promise(async move {
            db.import_json(&json).await.map_err(js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Close the connection; the next operation reopens it.
    pub fn close(&self) {
        self.inner.close();
    }
}

/// A schema-less table. Keys are numbers, strings or `Date`s.
#[wasm_bindgen(js_name = Table)]
pub struct JsTable {
    inner: Table<IndexedDbEngine>,
}

#[wasm_bindgen(js_class = Table)]
impl JsTable {
    #[wasm_bindgen(getter)]
    pub fn name(&self) -> String {
        self.inner.name().to_string()
    }

    /// Store `value` at `key` and resolve to the key used.
    ///
    /// `undefined`, `null`, `""` and `"auto"` let the table assign the next
    /// auto-increment key.
    pub fn set(&self, key: JsValue, value: JsValue) -> Promise {
        let table = self.inner.clone();
        future_to_promise(async move {
            let key = js_to_optional_key(&key).map_err(js_error)?;
            let value = js_to_value(value).await.map_err(js_error)?;
            let key = table.set(key, value).await.map_err(js_error)?;
            Ok(key_to_js(&key))
        })
    }

    /// Resolve to the value at `key`, or `undefined`.
    pub fn get(&self, key: JsValue) -> Promise {
        let table = self.inner.clone();
        future_to_promise(async move {
            let Some(key) = js_to_optional_key(&key).map_err(js_error)? else {
                return Err(JsValue::from_str("key is required"));
            };
            match table.get(key).await.map_err(js_error)? {
                Some(value) => value_to_js(&value).map_err(js_error),
                None => Ok(JsValue::UNDEFINED),
            }
        })
    }

    /// Remove the record at `key`. Resolves to `true`, also when nothing was
    /// stored there.
    pub fn delete(&self, key: JsValue) -> Promise {
        let table = self.inner.clone();
        future_to_promise(async move {
            let Some(key) = js_to_optional_key(&key).map_err(js_error)? else {
                return Err(JsValue::from_str("key is required"));
            };
            table.delete(key).await.map_err(js_error)?;
            Ok(JsValue::TRUE)
        })
    }

    /// Resolve to every record as `{key, value}`, in key order.
    #[wasm_bindgen(js_name = getAll)]
    pub fn get_all(&self) -> Promise {
        let table = self.inner.clone();
        future_to_promise(async move {
            let records = table.get_all().await.map_err(js_error)?;
            let array = Array::new();
            for record in &records {
                array.push(&record_to_js(record)?);
            }
            Ok(array.into())
        })
    }

    /// Remove every record. Resolves to `true`.
    pub fn clear(&self) -> Promise {
        let table = self.inner.clone();
        future_to_promise(async move {
            table.clear().await.map_err(js_error)?;
            Ok(JsValue::TRUE)
        })
    }
}

fn record_to_js(record: &Record) -> Result<JsValue, JsValue> {
    let obj = Object::new();
    Reflect::set(&obj, &"key".into(), &key_to_js(&record.key))?;
    Reflect::set(&obj, &"value".into(), &value_to_js(&record.value).map_err(js_error)?)?;
    Ok(obj.into())
}
