//! Database configuration

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File name (without extension) used for backups when none is given.
pub const DEFAULT_BACKUP_NAME: &str = "db_backup";

fn default_backup_file_name() -> String {
    DEFAULT_BACKUP_NAME.to_string()
}

fn default_pretty_export() -> bool {
    true
}

/// Settings for a [`crate::Database`].
///
/// Can be built in code or parsed from JSON, e.g.
/// `{"name": "app", "backup_file_name": "app_backup", "pretty_export": false}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database name in the engine. Must not be blank.
    pub name: String,

    /// Default download name for exports, without `.json`.
    #[serde(default = "default_backup_file_name")]
    pub backup_file_name: String,

    /// Indent exported JSON.
    #[serde(default = "default_pretty_export")]
    pub pretty_export: bool,
}

impl DatabaseConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backup_file_name: default_backup_file_name(),
            pretty_export: default_pretty_export(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn backup_file_name(mut self, name: impl Into<String>) -> Self {
        self.backup_file_name = name.into();
        self
    }

    pub fn pretty_export(mut self, pretty: bool) -> Self {
        self.pretty_export = pretty;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidName(self.name.clone()));
        }
        Ok(())
    }
}
