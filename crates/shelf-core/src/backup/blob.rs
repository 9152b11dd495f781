//! Text encoding for blob leaves
//!
//! A blob is written into JSON as a single string:
//! `__blob__:data:<mime>;base64,<payload>`. The decoder turns any string with
//! the `__blob__:data:` prefix back into a blob, so user strings that happen
//! to start with that prefix do not survive an export/import round trip.

use std::convert::Infallible;

use base64::{engine::general_purpose, Engine as _};

use crate::error::{Error, Result};
use crate::value::{Blob, Value, Visitor};

/// Prefix marking an encoded blob.
pub const BLOB_MARKER: &str = "__blob__:";

const DATA_URL: &str = "data:";
const BASE64_SEPARATOR: &str = ";base64,";

/// Encode a blob as a marked data URL.
pub fn encode_blob(blob: &Blob) -> String {
    format!(
        "{}{}{}{}{}",
        BLOB_MARKER,
        DATA_URL,
        blob.mime_type,
        BASE64_SEPARATOR,
        general_purpose::STANDARD.encode(&blob.bytes)
    )
}

/// Whether `text` carries the blob prefix.
pub fn is_encoded_blob(text: &str) -> bool {
    text.strip_prefix(BLOB_MARKER)
        .is_some_and(|rest| rest.starts_with(DATA_URL))
}

/// Decode a string produced by [`encode_blob`].
pub fn decode_blob(text: &str) -> Result<Blob> {
    let data_url = text
        .strip_prefix(BLOB_MARKER)
        .and_then(|rest| rest.strip_prefix(DATA_URL))
        .ok_or_else(|| Error::Format("blob marker missing".into()))?;
    let (mime_type, payload) = data_url
        .split_once(BASE64_SEPARATOR)
        .ok_or_else(|| Error::Format("blob is not a base64 data URL".into()))?;
    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| Error::Format(format!("blob payload: {}", e)))?;
    Ok(Blob::new(mime_type, bytes))
}

/// Replaces blob leaves with their text encoding.
#[derive(Debug, Default)]
pub struct BlobEncoder {
    pub encoded: usize,
}

impl Visitor for BlobEncoder {
    type Error = Infallible;

    fn visit_blob(&mut self, blob: Blob) -> std::result::Result<Value, Infallible> {
        self.encoded += 1;
        Ok(Value::String(encode_blob(&blob)))
    }
}

/// Restores blob leaves from their text encoding.
#[derive(Debug, Default)]
pub struct BlobDecoder {
    pub decoded: usize,
}

impl Visitor for BlobDecoder {
    type Error = Error;

    fn visit_scalar(&mut self, scalar: Value) -> Result<Value> {
        match scalar {
            Value::String(text) if is_encoded_blob(&text) => {
                let blob = decode_blob(&text)?;
                self.decoded += 1;
                Ok(Value::Blob(blob))
            }
            other => Ok(other),
        }
    }
}
