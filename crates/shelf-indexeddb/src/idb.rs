//! Low-level IndexedDB helpers using web-sys
//!
//! Wraps the callback-based IndexedDB API into Rust futures using
//! `wasm_bindgen_futures::JsFuture` and `js_sys::Promise`.

use js_sys::Promise;
use shelf_core::Upgrade;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    IdbCursorWithValue, IdbDatabase, IdbFactory, IdbObjectStore, IdbOpenDbRequest, IdbRequest,
    IdbTransaction, IdbTransactionMode, IdbVersionChangeEvent,
};

use crate::error::{IndexedDbError, Result};

type EventClosure = Closure<dyn FnMut(web_sys::Event)>;

type UpgradeClosure = Rc<RefCell<Option<Closure<dyn FnMut(IdbVersionChangeEvent)>>>>;

/// Get the global IndexedDB factory.
pub fn idb_factory() -> Result<IdbFactory> {
    let global = js_sys::global();

    let idb: JsValue = js_sys::Reflect::get(&global, &"indexedDB".into())
        .map_err(|_| IndexedDbError::NotAvailable("no indexedDB on global".into()))?;

    if idb.is_undefined() || idb.is_null() {
        return Err(IndexedDbError::NotAvailable(
            "indexedDB is null/undefined".into(),
        ));
    }

    idb.dyn_into::<IdbFactory>()
        .map_err(|_| IndexedDbError::NotAvailable("indexedDB is not IdbFactory".into()))
}

/// Convert an IdbRequest into a JS Promise that resolves with the request's result.
fn request_to_promise(req: &IdbRequest) -> Promise {
    let req = req.clone();

    Promise::new(&mut move |resolve, reject| {
        let closures: Rc<RefCell<Option<(EventClosure, EventClosure)>>> =
            Rc::new(RefCell::new(None));

        let req_s = req.clone();
        let closures_for_success = closures.clone();
        let on_success = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let result = req_s.result().unwrap_or(JsValue::UNDEFINED);
            let _ = resolve.call1(&JsValue::UNDEFINED, &result);
            *closures_for_success.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let req_e = req.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let msg = req_e
                .error()
                .ok()
                .flatten()
                .map(|e| JsValue::from(format!("{}: {}", e.name(), e.message())))
                .unwrap_or_else(|| JsValue::from_str("unknown IDB error"));
            let _ = reject.call1(&JsValue::UNDEFINED, &msg);
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        req.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        // Keep both alive until one fires
        *closures.borrow_mut() = Some((on_success, on_error));
    })
}

/// Convert an IdbTransaction completion into a JS Promise.
///
/// Rejects on `error` and on `abort`, so a transaction aborted without a
/// failing request still surfaces.
fn transaction_to_promise(tx: &IdbTransaction) -> Promise {
    let tx = tx.clone();

    Promise::new(&mut move |resolve, reject| {
        let closures: Rc<RefCell<Option<(EventClosure, EventClosure)>>> =
            Rc::new(RefCell::new(None));

        let closures_for_complete = closures.clone();
        let on_complete = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let _ = resolve.call0(&JsValue::UNDEFINED);
            *closures_for_complete.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let tx_e = tx.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let msg = tx_e
                .error()
                .map(|e| JsValue::from(format!("{}: {}", e.name(), e.message())))
                .unwrap_or_else(|| JsValue::from_str("transaction aborted"));
            let _ = reject.call1(&JsValue::UNDEFINED, &msg);
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        tx.set_oncomplete(Some(on_complete.as_ref().unchecked_ref()));
        tx.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        tx.set_onabort(Some(on_error.as_ref().unchecked_ref()));

        *closures.borrow_mut() = Some((on_complete, on_error));
    })
}

/// Open a database, applying `upgrade` if `version` is above the current one.
///
/// `None` opens at whatever version exists (1 for a new database). A failed
/// structural change aborts the version-change transaction, so the database
/// keeps its previous version and the error is returned.
pub async fn open_database(
    db_name: &str,
    version: Option<u32>,
    upgrade: Upgrade,
) -> Result<IdbDatabase> {
    let factory = idb_factory()?;

    let open_req: IdbOpenDbRequest = match version {
        Some(version) => factory.open_with_u32(db_name, version),
        None => factory.open(db_name),
    }
    .map_err(|e| IndexedDbError::Open(format!("{:?}", e)))?;

    let upgrade_closure: UpgradeClosure = Rc::new(RefCell::new(None));
    let upgrade_failure: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

    let failure = upgrade_failure.clone();
    let name = db_name.to_string();
    let on_upgrade = Closure::wrap(Box::new(move |event: IdbVersionChangeEvent| {
        debug!(
            database = %name,
            from = event.old_version(),
            to = ?event.new_version(),
            ?upgrade,
            "upgrade needed"
        );
        if let Err(msg) = apply_upgrade(&event, &upgrade) {
            *failure.borrow_mut() = Some(msg);
            if let Some(tx) = event
                .target()
                .and_then(|target| target.dyn_into::<IdbOpenDbRequest>().ok())
                .and_then(|req| req.transaction())
            {
                let _ = tx.abort();
            }
        }
    }) as Box<dyn FnMut(IdbVersionChangeEvent)>);

    open_req.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));
    *upgrade_closure.borrow_mut() = Some(on_upgrade);

    let open_promise = request_to_promise(open_req.unchecked_ref());
    let result = wasm_bindgen_futures::JsFuture::from(open_promise).await;

    *upgrade_closure.borrow_mut() = None;

    if let Some(msg) = upgrade_failure.borrow_mut().take() {
        return Err(IndexedDbError::Upgrade(msg));
    }
    let result = result.map_err(|e| IndexedDbError::Open(js_message(&e)))?;

    result
        .dyn_into::<IdbDatabase>()
        .map_err(|_| IndexedDbError::Open("result is not IdbDatabase".into()))
}

fn apply_upgrade(
    event: &IdbVersionChangeEvent,
    upgrade: &Upgrade,
) -> std::result::Result<(), String> {
    let req: IdbOpenDbRequest = event
        .target()
        .ok_or("upgrade event has no target")?
        .dyn_into()
        .map_err(|_| "upgrade target is not an open request".to_string())?;
    let db: IdbDatabase = req
        .result()
        .map_err(|e| js_message(&e))?
        .dyn_into()
        .map_err(|_| "upgrade result is not IdbDatabase".to_string())?;

    match upgrade {
        Upgrade::None => Ok(()),
        Upgrade::CreateStore(store) => {
            if db.object_store_names().contains(store) {
                return Ok(());
            }
            let params = web_sys::IdbObjectStoreParameters::new();
            js_sys::Reflect::set(&params, &"autoIncrement".into(), &JsValue::TRUE)
                .map_err(|e| js_message(&e))?;
            db.create_object_store_with_optional_parameters(store, &params)
                .map_err(|e| js_message(&e))?;
            Ok(())
        }
        Upgrade::DeleteStore(store) => {
            if db.object_store_names().contains(store) {
                db.delete_object_store(store).map_err(|e| js_message(&e))?;
            }
            Ok(())
        }
    }
}

/// Names of the object stores in `db`, in the order IndexedDB reports them (sorted).
pub fn store_names(db: &IdbDatabase) -> Vec<String> {
    let names = db.object_store_names();
    (0..names.length()).filter_map(|i| names.item(i)).collect()
}

/// Start a single-store transaction.
pub fn begin_transaction(
    db: &IdbDatabase,
    store_name: &str,
    mode: IdbTransactionMode,
) -> Result<(IdbTransaction, IdbObjectStore)> {
    let tx = db
        .transaction_with_str_and_mode(store_name, mode)
        .map_err(|e| IndexedDbError::Transaction(js_message(&e)))?;
    let store = tx
        .object_store(store_name)
        .map_err(|e| IndexedDbError::Request(js_message(&e)))?;
    Ok((tx, store))
}

/// Await an IdbRequest, resolving to its result JsValue.
pub async fn await_request(req: &IdbRequest) -> Result<JsValue> {
    let promise = request_to_promise(req);
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|e| IndexedDbError::Request(js_message(&e)))
}

/// Await an IdbTransaction to complete.
pub async fn await_transaction(tx: &IdbTransaction) -> Result<()> {
    let promise = transaction_to_promise(tx);
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|e| IndexedDbError::Transaction(js_message(&e)))?;
    Ok(())
}

/// Walk `store` with a cursor and collect `(key, value)` pairs in key order.
///
/// The success handler fires once per record and a last time with a `null`
/// cursor, so the handlers stay installed until then.
pub async fn collect_cursor(store: &IdbObjectStore) -> Result<Vec<(JsValue, JsValue)>> {
    let req = store
        .open_cursor()
        .map_err(|e| IndexedDbError::Request(format!("openCursor: {}", js_message(&e))))?;
    let rows: Rc<RefCell<Vec<(JsValue, JsValue)>>> = Rc::new(RefCell::new(Vec::new()));

    let rows_for_promise = rows.clone();
    let promise = Promise::new(&mut move |resolve, reject| {
        let closures: Rc<RefCell<Option<(EventClosure, EventClosure)>>> =
            Rc::new(RefCell::new(None));

        let req_s = req.clone();
        let rows = rows_for_promise.clone();
        let reject_s = reject.clone();
        let closures_for_success = closures.clone();
        let on_success = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let cursor = req_s
                .result()
                .ok()
                .and_then(|result| result.dyn_into::<IdbCursorWithValue>().ok());
            let Some(cursor) = cursor else {
                let _ = resolve.call0(&JsValue::UNDEFINED);
                *closures_for_success.borrow_mut() = None;
                return;
            };
            let step = cursor
                .key()
                .and_then(|key| cursor.value().map(|value| (key, value)))
                .and_then(|row| {
                    rows.borrow_mut().push(row);
                    cursor.continue_()
                });
            if let Err(e) = step {
                let _ = reject_s.call1(&JsValue::UNDEFINED, &e);
                *closures_for_success.borrow_mut() = None;
            }
        }) as Box<dyn FnMut(web_sys::Event)>);

        let req_e = req.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let msg = req_e
                .error()
                .ok()
                .flatten()
                .map(|e| JsValue::from(format!("{}: {}", e.name(), e.message())))
                .unwrap_or_else(|| JsValue::from_str("unknown IDB error"));
            let _ = reject.call1(&JsValue::UNDEFINED, &msg);
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        req.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        *closures.borrow_mut() = Some((on_success, on_error));
    });

    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|e| IndexedDbError::Request(format!("cursor: {}", js_message(&e))))?;
    let collected = std::mem::take(&mut *rows.borrow_mut());
    debug!(records = collected.len(), "cursor done");
    Ok(collected)
}

/// Delete an IndexedDB database by name.
pub async fn delete_database(db_name: &str) -> Result<()> {
    let factory = idb_factory()?;
    let req = factory
        .delete_database(db_name)
        .map_err(|e| IndexedDbError::Open(format!("delete db: {:?}", e)))?;
    let promise = request_to_promise(req.unchecked_ref());
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", js_message(&e))))?;
    Ok(())
}

/// Best-effort text for a rejected promise or thrown exception.
pub(crate) fn js_message(val: &JsValue) -> String {
    if let Some(text) = val.as_string() {
        return text;
    }
    if let Some(exception) = val.dyn_ref::<web_sys::DomException>() {
        return format!("{}: {}", exception.name(), exception.message());
    }
    format!("{:?}", val)
}
