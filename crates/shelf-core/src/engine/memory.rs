//! In-memory storage engine
//!
//! A BTreeMap-based engine for testing and development. It follows the
//! versioning rules of IndexedDB closely enough that the registry behaves the
//! same against it as in a browser:
//!
//! - opening without a version uses the current one (1 for a new database)
//! - the upgrade callback runs only when the version increases
//! - an upgrade fails with `Blocked` while other connections are open
//! - each store has a key generator starting at 1; explicit numeric keys at
//!   or above the generator push it to `floor(key) + 1`; `clear` keeps it
//!
//! Not suitable for production use due to lack of persistence.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use async_trait::async_trait;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::{Connection, Engine, Record, Upgrade};
use crate::key::{Key, MAX_SAFE_INTEGER};
use crate::value::Value;

#[derive(Debug)]
struct StoreState {
    records: BTreeMap<Key, Value>,
    next_key: f64,
}

impl StoreState {
    fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next_key: 1.0,
        }
    }

    fn put(&mut self, key: Key, value: Value) -> EngineResult<Key> {
        if !key.is_valid() {
            return Err(EngineError::InvalidKey(key.to_string()));
        }
        if let Key::Number(n) = key {
            if n >= self.next_key {
                self.next_key = (n.floor() + 1.0).min(MAX_SAFE_INTEGER + 1.0);
            }
        }
        self.records.insert(key.clone(), value);
        Ok(key)
    }

    fn add(&mut self, value: Value) -> EngineResult<Key> {
        if self.next_key > MAX_SAFE_INTEGER {
            return Err(EngineError::Constraint("key generator exhausted".into()));
        }
        let key = Key::Number(self.next_key);
        if self.records.contains_key(&key) {
            return Err(EngineError::Constraint(key.to_string()));
        }
        self.next_key += 1.0;
        self.records.insert(key.clone(), value);
        Ok(key)
    }
}

#[derive(Debug, Default)]
struct DatabaseState {
    version: u32,
    stores: BTreeMap<String, StoreState>,
    open: HashSet<u64>,
}

#[derive(Debug, Default)]
struct EngineState {
    databases: HashMap<String, DatabaseState>,
    next_connection: u64,
    opens: usize,
    fail_next_open: Option<String>,
    fail_next_transaction: Option<String>,
}

/// In-memory engine.
///
/// Clones share the same databases, so a clone can be kept by a test to
/// inspect what a `Database` did with the engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    state: Rc<RefCell<EngineState>>,
}

impl MemoryEngine {
    /// Create an engine with no databases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version of a database, `None` if it doesn't exist.
    pub fn version(&self, name: &str) -> Option<u32> {
        self.state.borrow().databases.get(name).map(|db| db.version)
    }

    /// Stores currently declared in a database.
    pub fn store_names(&self, name: &str) -> Vec<String> {
        self.state
            .borrow()
            .databases
            .get(name)
            .map(|db| db.stores.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of successful open requests across all databases.
    pub fn open_count(&self) -> usize {
        self.state.borrow().opens
    }

    /// Number of connections to `name` that are still open.
    pub fn open_connections(&self, name: &str) -> usize {
        self.state
            .borrow()
            .databases
            .get(name)
            .map(|db| db.open.len())
            .unwrap_or(0)
    }

    /// Make the next open request fail (for testing failure handling).
    pub fn fail_next_open(&self, reason: impl Into<String>) {
        self.state.borrow_mut().fail_next_open = Some(reason.into());
    }

    /// Make the next data transaction abort (for testing failure handling).
    pub fn fail_next_transaction(&self, reason: impl Into<String>) {
        self.state.borrow_mut().fail_next_transaction = Some(reason.into());
    }
}

#[async_trait(?Send)]
impl Engine for MemoryEngine {
    type Connection = MemoryConnection;

    async fn open(
        &self,
        name: &str,
        version: Option<u32>,
        upgrade: Upgrade,
    ) -> EngineResult<MemoryConnection> {
        let mut state = self.state.borrow_mut();
        if let Some(reason) = state.fail_next_open.take() {
            return Err(EngineError::Open(reason));
        }
        if version == Some(0) {
            return Err(EngineError::Open("version must be at least 1".into()));
        }

        let current = state.databases.get(name).map(|db| db.version).unwrap_or(0);
        let target = version.unwrap_or(current.max(1));
        if target < current {
            return Err(EngineError::Version {
                requested: target,
                current,
            });
        }

        if target > current {
            let others = state.databases.get(name).map(|db| db.open.len()).unwrap_or(0);
            if others > 0 {
                return Err(EngineError::Blocked(others));
            }
            let db = state.databases.entry(name.to_string()).or_default();
            db.version = target;
            match upgrade {
                Upgrade::None => {}
                Upgrade::CreateStore(store) => {
                    db.stores.entry(store).or_insert_with(StoreState::new);
                }
                Upgrade::DeleteStore(store) => {
                    db.stores.remove(&store);
                }
            }
        }

        let id = state.next_connection;
        state.next_connection += 1;
        state.opens += 1;

        let db = state
            .databases
            .get_mut(name)
            .ok_or_else(|| EngineError::Open(format!("database {} missing after open", name)))?;
        db.open.insert(id);

        Ok(MemoryConnection {
            engine: self.clone(),
            database: name.to_string(),
            id,
            version: db.version,
            stores: Rc::new(db.stores.keys().cloned().collect()),
            closed: Rc::new(Cell::new(false)),
        })
    }

    async fn delete_database(&self, name: &str) -> EngineResult<()> {
        let mut state = self.state.borrow_mut();
        let open = state.databases.get(name).map(|db| db.open.len()).unwrap_or(0);
        if open > 0 {
            return Err(EngineError::Blocked(open));
        }
        state.databases.remove(name);
        Ok(())
    }
}

/// Connection to a database in a [`MemoryEngine`].
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    engine: MemoryEngine,
    database: String,
    id: u64,
    version: u32,
    stores: Rc<Vec<String>>,
    closed: Rc<Cell<bool>>,
}

impl MemoryConnection {
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Run `f` against one store inside a single borrow of the engine state.
    fn with_store<T>(
        &self,
        store: &str,
        f: impl FnOnce(&mut StoreState) -> EngineResult<T>,
    ) -> EngineResult<T> {
        if self.closed.get() {
            return Err(EngineError::Closed);
        }
        if !self.contains_store(store) {
            return Err(EngineError::StoreNotFound(store.to_string()));
        }

        let mut state = self.engine.state.borrow_mut();
        if let Some(reason) = state.fail_next_transaction.take() {
            return Err(EngineError::Transaction(reason));
        }
        let store_state = state
            .databases
            .get_mut(&self.database)
            .and_then(|db| db.stores.get_mut(store))
            .ok_or_else(|| EngineError::StoreNotFound(store.to_string()))?;
        f(store_state)
    }
}

#[async_trait(?Send)]
impl Connection for MemoryConnection {
    fn version(&self) -> u32 {
        self.version
    }

    fn store_names(&self) -> Vec<String> {
        self.stores.as_ref().clone()
    }

    fn contains_store(&self, store: &str) -> bool {
        self.stores.iter().any(|s| s == store)
    }

    fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        if let Some(db) = self.engine.state.borrow_mut().databases.get_mut(&self.database) {
            db.open.remove(&self.id);
        }
    }

    async fn add(&self, store: &str, value: Value) -> EngineResult<Key> {
        self.with_store(store, |s| s.add(value))
    }

    async fn put(&self, store: &str, key: Key, value: Value) -> EngineResult<Key> {
        self.with_store(store, |s| s.put(key, value))
    }

    async fn get(&self, store: &str, key: &Key) -> EngineResult<Option<Value>> {
        if !key.is_valid() {
            return Err(EngineError::InvalidKey(key.to_string()));
        }
        // a stored undefined is indistinguishable from a missing record
        self.with_store(store, |s| {
            Ok(s.records.get(key).filter(|v| !v.is_undefined()).cloned())
        })
    }

    async fn delete(&self, store: &str, key: &Key) -> EngineResult<()> {
        if !key.is_valid() {
            return Err(EngineError::InvalidKey(key.to_string()));
        }
        self.with_store(store, |s| {
            s.records.remove(key);
            Ok(())
        })
    }

    async fn clear(&self, store: &str) -> EngineResult<()> {
        self.with_store(store, |s| {
            s.records.clear();
            Ok(())
        })
    }

    async fn scan(&self, store: &str) -> EngineResult<Vec<Record>> {
        self.with_store(store, |s| {
            Ok(s.records
                .iter()
                .map(|(key, value)| Record {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect())
        })
    }

    async fn replace_all(&self, store: &str, records: Vec<Record>) -> EngineResult<()> {
        if let Some(bad) = records.iter().find(|r| !r.key.is_valid()) {
            return Err(EngineError::InvalidKey(bad.key.to_string()));
        }
        self.with_store(store, |s| {
            s.records.clear();
            for record in records {
                s.put(record.key, record.value)?;
            }
            Ok(())
        })
    }
}
