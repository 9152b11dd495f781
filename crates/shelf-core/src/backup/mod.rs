//! Whole-database JSON export and import
//!
//! The backup envelope maps each table name to its records:
//!
//! ```json
//! { "users": [ { "key": 1, "value": { "name": "Alice" } } ] }
//! ```
//!
//! Blob leaves are written as marked base64 data URLs (see [`blob`]).
//!
//! Import parses and validates the whole envelope before writing anything,
//! then replaces each table in turn. Each table is replaced atomically, but
//! the import as a whole is not: if a later table fails, earlier tables have
//! already been overwritten.

pub mod blob;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::database::Database;
use crate::engine::{Engine, Record};
use crate::error::{Error, Result};
use crate::key::Key;
use crate::value::Value;

pub use blob::{decode_blob, encode_blob, BlobDecoder, BlobEncoder, BLOB_MARKER};

/// `value` is omitted for an undefined value, as `JSON.stringify` does, and
/// an explicit `null` stays null.
#[derive(Debug, Serialize, Deserialize)]
struct BackupRecord {
    key: Key,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    value: Option<serde_json::Value>,
}

fn present<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<serde_json::Value>, D::Error> {
    serde_json::Value::deserialize(deserializer).map(Some)
}

type Envelope = BTreeMap<String, Vec<BackupRecord>>;

impl<E: Engine> Database<E> {
    /// Serialize every table to the backup envelope.
    pub async fn export_json(&self) -> Result<String> {
        let envelope = self.export_envelope().await?;
        let json = if self.config.pretty_export {
            serde_json::to_string_pretty(&envelope)?
        } else {
            serde_json::to_string(&envelope)?
        };
        Ok(json)
    }

    async fn export_envelope(&self) -> Result<Envelope> {
        let mut envelope = Envelope::new();
        for name in self.table_names().await? {
            let records = self.table(&name).get_all().await?;
            let mut encoder = BlobEncoder::default();
            let rows = records
                .into_iter()
                .map(|record| encode_record(record, &mut encoder))
                .collect::<Result<Vec<_>>>()?;
            debug!(table = %name, records = rows.len(), blobs = encoder.encoded, "exported table");
            envelope.insert(name, rows);
        }
        info!(database = %self.name(), tables = envelope.len(), "exported database");
        Ok(envelope)
    }

    /// Restore tables from a backup envelope.
    ///
    /// Every table named in the envelope is created if needed, cleared, and
    /// refilled at the original keys. Tables not named are left alone.
    pub async fn import_json(&self, json: &str) -> Result<()> {
        let tables = parse_envelope(json)?;
        let count = tables.len();
        for (name, records) in tables {
            let len = records.len();
            self.table(&name).replace_all(records).await?;
            debug!(table = %name, records = len, "imported table");
        }
        info!(database = %self.name(), tables = count, "imported database");
        Ok(())
    }
}

fn encode_record(record: Record, encoder: &mut BlobEncoder) -> Result<BackupRecord> {
    let value = match record.value.transform(encoder) {
        Ok(Value::Undefined) => None,
        Ok(value) => {
            Some(serde_json::Value::try_from(value).map_err(|e| Error::Format(e.to_string()))?)
        }
        Err(never) => match never {},
    };
    Ok(BackupRecord {
        key: record.key,
        value,
    })
}

/// Parse a backup envelope into records per table, decoding blobs.
///
/// Fails with [`Error::Format`] on invalid JSON, a wrong shape, a blank
/// table name, or a malformed blob.
pub fn parse_envelope(json: &str) -> Result<BTreeMap<String, Vec<Record>>> {
    let envelope: Envelope =
        serde_json::from_str(json).map_err(|e| Error::Format(e.to_string()))?;

    let mut tables = BTreeMap::new();
    for (name, rows) in envelope {
        if name.is_empty() {
            return Err(Error::Format("table name must not be empty".into()));
        }
        let mut decoder = BlobDecoder::default();
        let records = rows
            .into_iter()
            .map(|row| {
                let value = match row.value {
                    Some(json) => Value::from(json).transform(&mut decoder)?,
                    None => Value::Undefined,
                };
                Ok(Record {
                    key: row.key,
                    value,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        tables.insert(name, records);
    }
    Ok(tables)
}
