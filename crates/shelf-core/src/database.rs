//! Database entry point
//!
//! `Database` hands out memoized [`Table`] façades and runs the structural
//! operations (drop, delete) through the shared [`Registry`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::info;

use crate::config::DatabaseConfig;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::table::Table;

/// A named database with lazily created tables.
///
/// Construction never touches storage; the first table operation opens the
/// database. All tables share one connection, which is reopened whenever a
/// different table is used, so work on one table must be awaited before
/// starting work on another (see [`crate::registry`]).
pub struct Database<E: Engine> {
    pub(crate) config: DatabaseConfig,
    pub(crate) registry: Rc<Registry<E>>,
    tables: RefCell<HashMap<String, Table<E>>>,
}

impl<E: Engine> Database<E> {
    /// Create a database handle with default settings.
    ///
    /// Fails with [`Error::InvalidName`] if `name` is blank.
    pub fn new(engine: E, name: &str) -> Result<Self> {
        Self::with_config(engine, DatabaseConfig::new(name))
    }

    pub fn with_config(engine: E, config: DatabaseConfig) -> Result<Self> {
        config.validate()?;
        let registry = Rc::new(Registry::new(engine, config.name.clone()));
        Ok(Self {
            config,
            registry,
            tables: RefCell::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry<E> {
        &self.registry
    }

    /// The façade for table `name`. Does not touch storage; the store is
    /// created on the first operation if it doesn't exist.
    pub fn table(&self, name: &str) -> Table<E> {
        self.tables
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| Table::new(name, self.registry.clone()))
            .clone()
    }

    /// Permanently delete table `name` and its records.
    pub async fn drop_table(&self, name: &str) -> Result<()> {
        self.registry.drop_store(name).await?;
        self.tables.borrow_mut().remove(name);
        Ok(())
    }

    /// Names of all tables in the database, sorted.
    pub async fn table_names(&self) -> Result<Vec<String>> {
        self.registry.store_names().await
    }

    /// `<file_name>.json`, falling back to the configured backup name.
    pub fn backup_file_name(&self, file_name: Option<&str>) -> String {
        let base = file_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.config.backup_file_name.as_str());
        format!("{}.json", base)
    }

    /// Release the open connection. The next operation reopens it.
    pub fn close(&self) {
        self.registry.close();
    }

    /// Close the connection and delete the whole database.
    pub async fn delete(self) -> Result<()> {
        self.registry.close();
        self.registry
            .engine()
            .delete_database(&self.config.name)
            .await
            .map_err(|source| Error::connection(&self.config.name, source))?;
        info!(database = %self.config.name, "deleted database");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, MemoryEngine, Record};
    use crate::key::Key;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn database() -> (MemoryEngine, Database<MemoryEngine>) {
        let engine = MemoryEngine::new();
        let db = Database::new(engine.clone(), "app").unwrap();
        (engine, db)
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(matches!(
            Database::new(MemoryEngine::new(), ""),
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            Database::new(MemoryEngine::new(), " \t"),
            Err(Error::InvalidName(_))
        ));
    }

    #[test]
    fn test_table_does_not_touch_storage() {
        let (engine, db) = database();

        let users = db.table("users");
        assert_eq!(users.name(), "users");
        assert_eq!(engine.open_count(), 0);
        assert_eq!(engine.version("app"), None);
    }

    #[test]
    fn test_table_is_memoized() {
        let (_, db) = database();

        db.table("users");
        db.table("users");
        db.table("posts");
        assert_eq!(db.tables.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_tables_share_connection_state() {
        let (engine, db) = database();

        let first = db.table("users");
        let second = db.table("users");
        first.set(Some(Key::from(1)), Value::from("a")).await.unwrap();
        assert_eq!(second.get(1).await.unwrap(), Some(Value::from("a")));
        assert_eq!(engine.open_count(), 1);
    }

    #[tokio::test]
    async fn test_switching_tables_keeps_records() {
        let (engine, db) = database();
        let a = db.table("a");
        let b = db.table("b");

        a.set(Some(Key::from("k")), Value::from("in a")).await.unwrap();
        b.set(Some(Key::from("k")), Value::from("in b")).await.unwrap();
        a.insert(Value::from("second")).await.unwrap();

        assert_eq!(
            a.get_all().await.unwrap(),
            vec![
                Record::new(1, "second"),
                Record::new("k", "in a"),
            ]
        );
        assert_eq!(b.get_all().await.unwrap(), vec![Record::new("k", "in b")]);
        assert_eq!(engine.version("app"), Some(2));
    }

    #[tokio::test]
    async fn test_drop_then_use_recreates_empty() {
        let (engine, db) = database();
        let stale = db.table("x");
        stale.insert(Value::from("old")).await.unwrap();
        stale.insert(Value::from("older")).await.unwrap();

        db.drop_table("x").await.unwrap();
        assert!(db.tables.borrow().get("x").is_none());
        assert!(engine.store_names("app").is_empty());

        let fresh = db.table("x");
        assert!(fresh.get_all().await.unwrap().is_empty());

        // the handle obtained before the drop resolves to the new store,
        // whose key generator starts over
        assert_eq!(stale.insert(Value::from("new")).await.unwrap(), Key::from(1));
        assert_eq!(fresh.get_all().await.unwrap(), vec![Record::new(1, "new")]);
    }

    #[tokio::test]
    async fn test_blocked_drop_keeps_table() {
        let (engine, db) = database();
        let users = db.table("users");
        users.insert(Value::from("Alice")).await.unwrap();

        let other = Registry::new(engine.clone(), "app");
        other.connection().await.unwrap();

        let err = db.drop_table("users").await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert_eq!(err.engine_error(), Some(&EngineError::Blocked(1)));
        assert!(!db.registry().is_open());
        assert!(db.tables.borrow().contains_key("users"));
        assert_eq!(engine.version("app"), Some(1));

        // the failed drop left the records in place and the next call retries
        other.close();
        assert_eq!(users.get_all().await.unwrap(), vec![Record::new(1, "Alice")]);
        db.drop_table("users").await.unwrap();
        assert!(db.tables.borrow().get("users").is_none());
        assert!(db.table_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_missing_table() {
        let (_, db) = database();
        db.table("users").insert(Value::Null).await.unwrap();

        db.drop_table("nope").await.unwrap();
        assert_eq!(db.table_names().await.unwrap(), vec!["users"]);
    }

    #[tokio::test]
    async fn test_open_failure_then_retry() {
        let (engine, db) = database();
        let users = db.table("users");

        engine.fail_next_open("denied");
        assert!(matches!(
            users.get(1).await,
            Err(Error::Connection { .. })
        ));
        assert!(!db.registry().is_open());
        assert_eq!(users.get(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_table_names() {
        let (_, db) = database();
        assert!(db.table_names().await.unwrap().is_empty());

        db.table("zeta").clear().await.unwrap();
        db.table("alpha").clear().await.unwrap();
        assert_eq!(db.table_names().await.unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_backup_file_name() {
        let (_, db) = database();
        assert_eq!(db.backup_file_name(None), "db_backup.json");
        assert_eq!(db.backup_file_name(Some("")), "db_backup.json");
        assert_eq!(db.backup_file_name(Some("nightly")), "nightly.json");

        let custom = Database::with_config(
            MemoryEngine::new(),
            DatabaseConfig::new("app").backup_file_name("app_dump"),
        )
        .unwrap();
        assert_eq!(custom.backup_file_name(None), "app_dump.json");
    }

    #[tokio::test]
    async fn test_close_and_delete() {
        let (engine, db) = database();
        db.table("users").insert(Value::Null).await.unwrap();

        db.close();
        assert_eq!(engine.open_connections("app"), 0);
        // reopens transparently
        assert_eq!(db.table("users").get_all().await.unwrap().len(), 1);

        db.delete().await.unwrap();
        assert_eq!(engine.version("app"), None);
    }
}
