//! Structured record values
//!
//! A `Value` is the payload stored against a key: a JSON-like tree whose
//! leaves may also be binary blobs. Trees are rewritten with a [`Visitor`],
//! which sees blob leaves and scalar leaves while `transform` handles the
//! recursion into arrays and objects.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::key::MAX_SAFE_INTEGER;

/// A binary payload with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blob {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// A stored value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    /// JavaScript `undefined`. A record whose whole value is `Undefined`
    /// reads back as "not found".
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Blob(Blob),
}

/// Rewrites the leaves of a value tree.
///
/// Both hooks default to returning the leaf unchanged.
pub trait Visitor {
    type Error;

    fn visit_blob(&mut self, blob: Blob) -> Result<Value, Self::Error> {
        Ok(Value::Blob(blob))
    }

    /// Called for `Null`, `Undefined`, `Bool`, `Number` and `String`.
    fn visit_scalar(&mut self, scalar: Value) -> Result<Value, Self::Error> {
        Ok(scalar)
    }
}

impl Value {
    /// Rebuild this tree, passing every leaf through `visitor`.
    pub fn transform<V: Visitor + ?Sized>(self, visitor: &mut V) -> Result<Value, V::Error> {
        match self {
            Value::Blob(blob) => visitor.visit_blob(blob),
            Value::Array(items) => items
                .into_iter()
                .map(|item| item.transform(visitor))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(fields) => fields
                .into_iter()
                .map(|(name, field)| field.transform(visitor).map(|v| (name, v)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Value::Object),
            scalar => visitor.visit_scalar(scalar),
        }
    }

    /// Collect references to every blob leaf, depth first.
    pub fn blobs(&self) -> Vec<&Blob> {
        let mut found = Vec::new();
        collect_blobs(self, &mut found);
        found
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.get(field),
            _ => None,
        }
    }
}

fn collect_blobs<'a>(value: &'a Value, found: &mut Vec<&'a Blob>) {
    match value {
        Value::Blob(blob) => found.push(blob),
        Value::Array(items) => items.iter().for_each(|item| collect_blobs(item, found)),
        Value::Object(fields) => fields.values().for_each(|field| collect_blobs(field, found)),
        _ => {}
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Blob> for Value {
    fn from(blob: Blob) -> Self {
        Value::Blob(blob)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(name, field)| (name, Value::from(field)))
                    .collect(),
            ),
        }
    }
}

/// A blob leaf reached JSON conversion without being encoded first.
#[derive(Debug, Error)]
#[error("blob ({mime_type}, {len} bytes) has no JSON representation")]
pub struct UnencodedBlob {
    pub mime_type: String,
    pub len: usize,
}

/// Follows `JSON.stringify`: `Undefined` becomes null inside arrays and
/// drops the field inside objects.
impl TryFrom<Value> for serde_json::Value {
    type Error = UnencodedBlob;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::Null | Value::Undefined => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) => number_to_json(n),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(items) => serde_json::Value::Array(
                items
                    .into_iter()
                    .map(serde_json::Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(fields) => serde_json::Value::Object(
                fields
                    .into_iter()
                    .filter(|(_, field)| !field.is_undefined())
                    .map(|(name, field)| serde_json::Value::try_from(field).map(|v| (name, v)))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Blob(blob) => {
                return Err(UnencodedBlob {
                    mime_type: blob.mime_type,
                    len: blob.bytes.len(),
                })
            }
        })
    }
}

/// Integral doubles become JSON integers; NaN and infinities become null,
/// as `JSON.stringify` does.
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}
