//! Browser tests for the IndexedDB engine.
//!
//! Run with `wasm-pack test --headless --firefox crates/shelf-indexeddb`.

#![cfg(target_arch = "wasm32")]

use shelf_core::{Blob, Connection, Database, Engine, Error, Key, Record, Upgrade, Value};
use shelf_indexeddb::convert::js_to_value;
use shelf_indexeddb::IndexedDbEngine;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

async fn fresh(name: &str) -> Database<IndexedDbEngine> {
    IndexedDbEngine.delete_database(name).await.unwrap();
    Database::new(IndexedDbEngine::new(), name).unwrap()
}

#[wasm_bindgen_test]
fn test_indexeddb_available() {
    IndexedDbEngine::check_available().unwrap();
}

#[wasm_bindgen_test]
async fn test_open_creates_store_with_upgrade() {
    let engine = IndexedDbEngine::new();
    engine.delete_database("shelf-open").await.unwrap();

    let conn = engine
        .open("shelf-open", None, Upgrade::None)
        .await
        .unwrap();
    assert_eq!(conn.version(), 1);
    assert!(conn.store_names().is_empty());
    conn.close();

    let conn = engine
        .open("shelf-open", Some(2), Upgrade::CreateStore("users".into()))
        .await
        .unwrap();
    assert_eq!(conn.version(), 2);
    assert_eq!(conn.store_names(), vec!["users"]);
    conn.close();

    engine.delete_database("shelf-open").await.unwrap();
}

#[wasm_bindgen_test]
async fn test_auto_keys_and_explicit_keys() {
    let db = fresh("shelf-keys").await;
    let users = db.table("users");

    assert_eq!(users.insert(Value::from("a")).await.unwrap(), Key::from(1));
    users.set(Some(Key::from(10)), Value::from("b")).await.unwrap();
    assert_eq!(
        users.set(Some(Key::from("auto")), Value::from("c")).await.unwrap(),
        Key::from(11)
    );
    users.set(Some(Key::from("x")), Value::from("d")).await.unwrap();

    let keys: Vec<Key> = users
        .get_all()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.key)
        .collect();
    assert_eq!(keys, vec![Key::from(1), Key::from(10), Key::from(11), Key::from("x")]);

    db.delete().await.unwrap();
}

#[wasm_bindgen_test]
async fn test_get_delete_clear() {
    let db = fresh("shelf-crud").await;
    let notes = db.table("notes");

    notes.set(Some(Key::from("k")), Value::Null).await.unwrap();
    assert_eq!(notes.get("k").await.unwrap(), Some(Value::Null));
    assert_eq!(notes.get("missing").await.unwrap(), None);

    notes.delete("k").await.unwrap();
    notes.delete("k").await.unwrap();
    assert_eq!(notes.get("k").await.unwrap(), None);

    notes.insert(Value::from(1)).await.unwrap();
    notes.clear().await.unwrap();
    assert!(notes.get_all().await.unwrap().is_empty());

    db.delete().await.unwrap();
}

#[wasm_bindgen_test]
async fn test_undefined_reads_as_missing() {
    let db = fresh("shelf-undefined").await;
    let notes = db.table("notes");

    let value = js_to_value(JsValue::UNDEFINED).await.unwrap();
    assert_eq!(value, Value::Undefined);
    assert_eq!(js_to_value(JsValue::NULL).await.unwrap(), Value::Null);

    notes.set(Some(Key::from("u")), value).await.unwrap();
    notes.set(Some(Key::from("n")), Value::Null).await.unwrap();
    assert_eq!(notes.get("u").await.unwrap(), None);
    assert_eq!(notes.get("n").await.unwrap(), Some(Value::Null));

    // the record still exists and is listed in key order
    let records = notes.get_all().await.unwrap();
    assert_eq!(
        records,
        vec![Record::new("n", Value::Null), Record::new("u", Value::Undefined)]
    );

    db.delete().await.unwrap();
}

#[wasm_bindgen_test]
async fn test_tables_across_reconnects() {
    let db = fresh("shelf-tables").await;
    db.table("a").insert(Value::from("one")).await.unwrap();
    db.table("b").insert(Value::from("two")).await.unwrap();
    db.table("a").insert(Value::from("three")).await.unwrap();

    assert_eq!(db.table_names().await.unwrap(), vec!["a", "b"]);
    assert_eq!(db.table("a").get_all().await.unwrap().len(), 2);

    db.drop_table("a").await.unwrap();
    assert_eq!(db.table_names().await.unwrap(), vec!["b"]);

    db.delete().await.unwrap();
}

#[wasm_bindgen_test]
async fn test_blob_values_survive_storage_and_backup() {
    let db = fresh("shelf-blobs").await;
    let png = Blob::new("image/png", vec![137, 80, 78, 71, 0, 255]);
    db.table("files")
        .set(Some(Key::from("logo")), Value::Blob(png.clone()))
        .await
        .unwrap();

    assert_eq!(
        db.table("files").get("logo").await.unwrap(),
        Some(Value::Blob(png.clone()))
    );

    let backup = db.export_json().await.unwrap();
    assert!(backup.contains("__blob__:data:image/png;base64,"));

    let copy = fresh("shelf-blobs-copy").await;
    copy.import_json(&backup).await.unwrap();
    assert_eq!(
        copy.table("files").get_all().await.unwrap(),
        vec![Record::new("logo", Value::Blob(png))]
    );

    db.delete().await.unwrap();
    copy.delete().await.unwrap();
}

#[wasm_bindgen_test]
async fn test_nan_key_is_rejected() {
    let db = fresh("shelf-nan").await;
    let err = db
        .table("t")
        .set(Some(Key::Number(f64::NAN)), Value::from(1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transaction { .. }), "{err}");
    db.delete().await.unwrap();
}
