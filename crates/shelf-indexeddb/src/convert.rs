//! JS <-> shelf value conversion
//!
//! Values are stored as plain structured-clone data: objects, arrays,
//! primitives and `Blob`s. Reading is async because a `Blob`'s bytes are
//! only reachable through a promise.

use futures::future::{FutureExt, LocalBoxFuture};
use js_sys::{Array, ArrayBuffer, Object, Reflect, Uint8Array};
use shelf_core::{Blob, Key, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::error::{IndexedDbError, Result};
use crate::idb::js_message;

const OCTET_STREAM: &str = "application/octet-stream";

/// Convert a key to its IndexedDB form.
pub fn key_to_js(key: &Key) -> JsValue {
    match key {
        Key::Number(n) => JsValue::from_f64(*n),
        Key::Date(ms) => js_sys::Date::new(&JsValue::from_f64(*ms)).into(),
        Key::String(s) => JsValue::from_str(s),
    }
}

/// Convert an IndexedDB key back. Array and binary keys are not supported.
pub fn js_to_key(val: &JsValue) -> Result<Key> {
    if let Some(n) = val.as_f64() {
        return Ok(Key::Number(n));
    }
    if let Some(s) = val.as_string() {
        return Ok(Key::String(s));
    }
    if let Some(date) = val.dyn_ref::<js_sys::Date>() {
        return Ok(Key::Date(date.get_time()));
    }
    Err(IndexedDbError::UnsupportedKey(format!("{:?}", val)))
}

/// Like [`js_to_key`], with `undefined` and `null` meaning "no key".
pub fn js_to_optional_key(val: &JsValue) -> Result<Option<Key>> {
    if val.is_undefined() || val.is_null() {
        return Ok(None);
    }
    js_to_key(val).map(Some)
}

/// Convert a value to a JS structured-clone value.
pub fn value_to_js(value: &Value) -> Result<JsValue> {
    let js = match value {
        Value::Null => JsValue::NULL,
        Value::Undefined => JsValue::UNDEFINED,
        Value::Bool(b) => JsValue::from_bool(*b),
        Value::Number(n) => JsValue::from_f64(*n),
        Value::String(s) => JsValue::from_str(s),
        Value::Array(items) => {
            let array = Array::new_with_length(items.len() as u32);
            for (i, item) in items.iter().enumerate() {
                array.set(i as u32, value_to_js(item)?);
            }
            array.into()
        }
        Value::Object(fields) => {
            let obj = Object::new();
            for (field, item) in fields {
                Reflect::set(&obj, &field.into(), &value_to_js(item)?).map_err(|e| {
                    IndexedDbError::JsValue(format!("set {}: {}", field, js_message(&e)))
                })?;
            }
            obj.into()
        }
        Value::Blob(blob) => blob_to_js(blob)?.into(),
    };
    Ok(js)
}

/// Build a JS `Blob` holding a copy of the bytes.
pub fn blob_to_js(blob: &Blob) -> Result<web_sys::Blob> {
    let parts = Array::of1(&Uint8Array::from(blob.bytes.as_slice()));
    let options = web_sys::BlobPropertyBag::new();
    Reflect::set(&options, &"type".into(), &blob.mime_type.as_str().into())
        .map_err(|e| IndexedDbError::JsValue(js_message(&e)))?;
    web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options)
        .map_err(|e| IndexedDbError::JsValue(format!("Blob: {}", js_message(&e))))
}

/// Convert a JS value to a shelf value, reading any `Blob` contents.
///
/// `Date`s become ISO strings. `ArrayBuffer`s and `Uint8Array`s become
/// octet-stream blobs. Functions and symbols are rejected.
pub fn js_to_value(val: JsValue) -> LocalBoxFuture<'static, Result<Value>> {
    async move {
        if val.is_undefined() {
            return Ok(Value::Undefined);
        }
        if val.is_null() {
            return Ok(Value::Null);
        }
        if let Some(b) = val.as_bool() {
            return Ok(Value::Bool(b));
        }
        if let Some(n) = val.as_f64() {
            return Ok(Value::Number(n));
        }
        if let Some(s) = val.as_string() {
            return Ok(Value::String(s));
        }
        if let Some(blob) = val.dyn_ref::<web_sys::Blob>() {
            return Ok(Value::Blob(read_blob(blob).await?));
        }
        if let Some(date) = val.dyn_ref::<js_sys::Date>() {
            return Ok(Value::String(date.to_iso_string().into()));
        }
        if let Some(bytes) = val.dyn_ref::<Uint8Array>() {
            return Ok(Value::Blob(Blob::new(OCTET_STREAM, bytes.to_vec())));
        }
        if val.is_instance_of::<ArrayBuffer>() {
            return Ok(Value::Blob(Blob::new(OCTET_STREAM, Uint8Array::new(&val).to_vec())));
        }
        if Array::is_array(&val) {
            let array = Array::from(&val);
            let mut items = Vec::with_capacity(array.length() as usize);
            for item in array.iter() {
                items.push(js_to_value(item).await?);
            }
            return Ok(Value::Array(items));
        }
        if let Some(obj) = val.dyn_ref::<Object>() {
            if !val.is_function() {
                let mut fields = std::collections::BTreeMap::new();
                for field in Object::keys(obj).iter() {
                    let Some(name) = field.as_string() else {
                        continue;
                    };
                    let item = Reflect::get(obj, &field)
                        .map_err(|e| IndexedDbError::JsValue(js_message(&e)))?;
                    fields.insert(name, js_to_value(item).await?);
                }
                return Ok(Value::Object(fields));
            }
        }
        Err(IndexedDbError::JsValue(format!("unsupported value: {:?}", val)))
    }
    .boxed_local()
}

/// Read a JS `Blob`'s bytes.
pub async fn read_blob(blob: &web_sys::Blob) -> Result<Blob> {
    let buffer = JsFuture::from(blob.array_buffer())
        .await
        .map_err(|e| IndexedDbError::JsValue(format!("Blob.arrayBuffer: {}", js_message(&e))))?;
    Ok(Blob::new(blob.type_(), Uint8Array::new(&buffer).to_vec()))
}
