//! Store registry: owns the database connection
//!
//! The engine only lets stores be created inside a version upgrade, and an
//! upgrade cannot start while a connection is open. The registry hides that:
//! it keeps at most one open connection, remembers which store it was last
//! resolved for, and reopens (upgrading when the store is missing) whenever a
//! different store is requested.
//!
//! # Usage constraint
//!
//! Switching stores closes the shared connection. Operations still in flight
//! on the previous store fail when that happens, so callers must await work
//! on one table before starting work on another.

use std::cell::RefCell;

use tracing::{debug, info, warn};

use crate::engine::{Connection, Engine, EngineError, EngineResult, Upgrade};
use crate::error::{Error, Result};

enum ConnectionState<C> {
    Closed,
    Open {
        connection: C,
        /// Store the connection was last resolved for; `None` after a bare
        /// open or a drop.
        store: Option<String>,
    },
}

/// Owns the single connection to one database.
pub struct Registry<E: Engine> {
    engine: E,
    database: String,
    state: RefCell<ConnectionState<E::Connection>>,
}

impl<E: Engine> Registry<E> {
    pub fn new(engine: E, database: impl Into<String>) -> Self {
        Self {
            engine,
            database: database.into(),
            state: RefCell::new(ConnectionState::Closed),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state.borrow(), ConnectionState::Open { .. })
    }

    /// Store the open connection was last resolved for.
    pub fn bound_store(&self) -> Option<String> {
        match &*self.state.borrow() {
            ConnectionState::Open { store, .. } => store.clone(),
            ConnectionState::Closed => None,
        }
    }

    /// Return a connection that contains `store`, creating the store if
    /// needed.
    ///
    /// Reuses the open connection when it was last resolved for the same
    /// store. Otherwise the connection is closed and the database reopened;
    /// if the store is still missing, it is declared by reopening at
    /// version + 1.
    pub async fn ensure(&self, store: &str) -> Result<E::Connection> {
        if store.is_empty() {
            return Err(Error::InvalidTable(store.to_string()));
        }
        if let Some(connection) = self.bound_to(store) {
            return Ok(connection);
        }

        self.close();
        match self.open_store(store).await {
            Ok(connection) => {
                self.bind(connection.clone(), Some(store));
                Ok(connection)
            }
            Err(source) => {
                warn!(database = %self.database, store, error = %source, "failed to open store");
                Err(Error::connection(&self.database, source))
            }
        }
    }

    /// Return the open connection, opening the database at its current
    /// version if none is open. No store is declared.
    pub async fn connection(&self) -> Result<E::Connection> {
        if let Some(connection) = self.current() {
            return Ok(connection);
        }
        let connection = self
            .engine
            .open(&self.database, None, Upgrade::None)
            .await
            .map_err(|source| {
                warn!(database = %self.database, error = %source, "failed to open database");
                Error::connection(&self.database, source)
            })?;
        debug!(database = %self.database, version = connection.version(), "opened database");
        self.bind(connection.clone(), None);
        Ok(connection)
    }

    /// Names of the stores declared in the database, sorted.
    pub async fn store_names(&self) -> Result<Vec<String>> {
        let mut names = self.connection().await?.store_names();
        names.sort();
        Ok(names)
    }

    /// Delete `store` by reopening at version + 1. Deleting a store that
    /// doesn't exist still bumps the version but is otherwise a no-op.
    pub async fn drop_store(&self, store: &str) -> Result<()> {
        if store.is_empty() {
            return Err(Error::InvalidTable(store.to_string()));
        }
        let connection = self.connection().await?;
        let next = next_version(connection.version())
            .map_err(|source| Error::connection(&self.database, source))?;

        self.close();
        let connection = self
            .engine
            .open(
                &self.database,
                Some(next),
                Upgrade::DeleteStore(store.to_string()),
            )
            .await
            .map_err(|source| {
                warn!(database = %self.database, store, error = %source, "failed to drop store");
                Error::connection(&self.database, source)
            })?;

        info!(database = %self.database, store, version = next, "dropped store");
        self.bind(connection, None);
        Ok(())
    }

    /// Close the open connection, if any.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.state.borrow_mut(), ConnectionState::Closed);
        if let ConnectionState::Open { connection, store } = previous {
            debug!(database = %self.database, store = ?store, "closing connection");
            connection.close();
        }
    }

    async fn open_store(&self, store: &str) -> EngineResult<E::Connection> {
        let connection = self
            .engine
            .open(&self.database, None, Upgrade::CreateStore(store.to_string()))
            .await?;
        if connection.contains_store(store) {
            debug!(
                database = %self.database,
                store,
                version = connection.version(),
                "opened store"
            );
            return Ok(connection);
        }

        // Database already existed without this store: declare it in an upgrade.
        let next = next_version(connection.version())?;
        connection.close();
        debug!(database = %self.database, store, version = next, "upgrading to create store");

        let connection = self
            .engine
            .open(
                &self.database,
                Some(next),
                Upgrade::CreateStore(store.to_string()),
            )
            .await?;
        if !connection.contains_store(store) {
            connection.close();
            return Err(EngineError::Open(format!(
                "store {} missing after upgrade to version {}",
                store, next
            )));
        }
        Ok(connection)
    }

    fn current(&self) -> Option<E::Connection> {
        match &*self.state.borrow() {
            ConnectionState::Open { connection, .. } => Some(connection.clone()),
            ConnectionState::Closed => None,
        }
    }

    fn bound_to(&self, wanted: &str) -> Option<E::Connection> {
        match &*self.state.borrow() {
            ConnectionState::Open {
                connection,
                store: Some(store),
            } if store == wanted => Some(connection.clone()),
            _ => None,
        }
    }

    /// Replace the state with a fresh connection. Whatever was bound before,
    /// including a connection from an overlapping call, is closed first.
    fn bind(&self, connection: E::Connection, store: Option<&str>) {
        self.close();
        *self.state.borrow_mut() = ConnectionState::Open {
            connection,
            store: store.map(str::to_string),
        };
    }
}

fn next_version(version: u32) -> EngineResult<u32> {
    version
        .checked_add(1)
        .ok_or_else(|| EngineError::Open(format!("version {} cannot be raised", version)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use pretty_assertions::assert_eq;

    fn registry() -> (MemoryEngine, Registry<MemoryEngine>) {
        let engine = MemoryEngine::new();
        (engine.clone(), Registry::new(engine, "app"))
    }

    #[tokio::test]
    async fn test_first_ensure_creates_database() {
        let (engine, registry) = registry();

        let conn = registry.ensure("notes").await.unwrap();
        assert!(conn.contains_store("notes"));
        assert_eq!(engine.version("app"), Some(1));
        assert_eq!(engine.open_count(), 1);
        assert_eq!(registry.bound_store(), Some("notes".to_string()));
    }

    #[tokio::test]
    async fn test_fast_path_reuses_connection() {
        let (engine, registry) = registry();

        registry.ensure("notes").await.unwrap();
        registry.ensure("notes").await.unwrap();
        registry.ensure("notes").await.unwrap();

        assert_eq!(engine.open_count(), 1);
        assert_eq!(engine.open_connections("app"), 1);
    }

    #[tokio::test]
    async fn test_missing_store_upgrades_once() {
        let (engine, registry) = registry();

        registry.ensure("a").await.unwrap();
        let conn = registry.ensure("b").await.unwrap();

        // reopen at v1 (no b), then upgrade to v2
        assert_eq!(engine.open_count(), 3);
        assert_eq!(conn.version(), 2);
        assert_eq!(engine.store_names("app"), vec!["a", "b"]);
        assert_eq!(engine.open_connections("app"), 1);
    }

    #[tokio::test]
    async fn test_switching_stores_never_bumps_version() {
        let (engine, registry) = registry();
        registry.ensure("a").await.unwrap();
        registry.ensure("b").await.unwrap();
        assert_eq!(engine.version("app"), Some(2));

        for store in ["a", "b", "a", "a", "b"] {
            let conn = registry.ensure(store).await.unwrap();
            assert!(conn.contains_store(store));
        }
        assert_eq!(engine.version("app"), Some(2));
        assert_eq!(engine.open_connections("app"), 1);
    }

    #[tokio::test]
    async fn test_open_failure_leaves_registry_closed() {
        let (engine, registry) = registry();
        registry.ensure("a").await.unwrap();

        engine.fail_next_open("quota exceeded");
        let err = registry.ensure("b").await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert!(!registry.is_open());
        assert_eq!(engine.open_connections("app"), 0);

        // next call starts from scratch
        registry.ensure("b").await.unwrap();
        assert_eq!(registry.bound_store(), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_blocked_upgrade_is_connection_error() {
        let (engine, registry) = registry();
        registry.ensure("a").await.unwrap();

        let other = Registry::new(engine.clone(), "app");
        other.connection().await.unwrap();

        let err = registry.ensure("b").await.unwrap_err();
        assert_eq!(err.engine_error(), Some(&EngineError::Blocked(1)));
        assert!(!registry.is_open());

        other.close();
        registry.ensure("b").await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_store() {
        let (engine, registry) = registry();
        registry.ensure("a").await.unwrap();
        registry.ensure("b").await.unwrap();

        registry.drop_store("a").await.unwrap();
        assert_eq!(engine.store_names("app"), vec!["b"]);
        assert_eq!(engine.version("app"), Some(3));
        assert!(registry.is_open());
        assert_eq!(registry.bound_store(), None);
        assert_eq!(registry.store_names().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_drop_without_open_connection() {
        let (engine, registry) = registry();

        registry.drop_store("ghost").await.unwrap();
        assert_eq!(engine.version("app"), Some(2));
        assert!(engine.store_names("app").is_empty());
    }

    #[tokio::test]
    async fn test_connection_reuses_bound_handle() {
        let (engine, registry) = registry();
        registry.ensure("a").await.unwrap();

        registry.connection().await.unwrap();
        assert_eq!(engine.open_count(), 1);
        assert_eq!(registry.bound_store(), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_empty_store_name() {
        let (engine, registry) = registry();

        assert!(matches!(
            registry.ensure("").await,
            Err(Error::InvalidTable(_))
        ));
        assert_eq!(engine.open_count(), 0);
    }

    #[tokio::test]
    async fn test_close() {
        let (engine, registry) = registry();
        let conn = registry.ensure("a").await.unwrap();

        registry.close();
        assert!(conn.is_closed());
        assert!(!registry.is_open());
        assert_eq!(engine.open_connections("app"), 0);
    }
}
