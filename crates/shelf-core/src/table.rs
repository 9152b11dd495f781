//! Table façade: CRUD bound to one store
//!
//! A `Table` holds only the store name and a shared handle to the registry.
//! Every operation resolves the connection again through
//! [`Registry::ensure`], so a `Table` obtained before a drop keeps working
//! against the recreated store.

use std::rc::Rc;

use crate::engine::{Connection, Engine, EngineResult, Record};
use crate::error::{Error, Result};
use crate::key::Key;
use crate::registry::Registry;
use crate::value::Value;

/// String key that requests an engine-assigned key, same as passing `None`.
///
/// Reserving it means the literal text "auto" can never be stored as a key.
pub const AUTO_KEY: &str = "auto";

/// CRUD operations on one named store.
pub struct Table<E: Engine> {
    name: Rc<str>,
    registry: Rc<Registry<E>>,
}

impl<E: Engine> Clone for Table<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<E: Engine> std::fmt::Debug for Table<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("database", &self.registry.database())
            .finish()
    }
}

impl<E: Engine> Table<E> {
    pub(crate) fn new(name: &str, registry: Rc<Registry<E>>) -> Self {
        Self {
            name: Rc::from(name),
            registry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write `value`.
    ///
    /// With no key, an empty string key, or [`AUTO_KEY`], the engine assigns
    /// the next sequential integer. Any other key is created or overwritten.
    /// Returns the key the record was stored under.
    pub async fn set(&self, key: Option<Key>, value: Value) -> Result<Key> {
        match resolve_key(key) {
            Some(key) => {
                self.run("put", |conn, store| async move { conn.put(&store, key, value).await })
                    .await
            }
            None => {
                self.run("add", |conn, store| async move { conn.add(&store, value).await })
                    .await
            }
        }
    }

    /// Write `value` under an engine-assigned key.
    pub async fn insert(&self, value: Value) -> Result<Key> {
        self.set(None, value).await
    }

    /// Read the value at `key`; `None` if there is no record.
    pub async fn get(&self, key: impl Into<Key>) -> Result<Option<Value>> {
        let key = key.into();
        self.run("get", |conn, store| async move { conn.get(&store, &key).await })
            .await
    }

    /// Remove the record at `key`. Succeeds if it was already absent.
    pub async fn delete(&self, key: impl Into<Key>) -> Result<()> {
        let key = key.into();
        self.run("delete", |conn, store| async move { conn.delete(&store, &key).await })
            .await
    }

    /// Every record, in ascending key order.
    ///
    /// Reads the whole store into memory.
    pub async fn get_all(&self) -> Result<Vec<Record>> {
        self.run("get_all", |conn, store| async move { conn.scan(&store).await })
            .await
    }

    /// Remove every record. The key generator is not reset.
    pub async fn clear(&self) -> Result<()> {
        self.run("clear", |conn, store| async move { conn.clear(&store).await })
            .await
    }

    /// Clear the store and write `records` at their own keys, in one
    /// transaction. Resolves once the transaction has committed.
    pub async fn replace_all(&self, records: Vec<Record>) -> Result<()> {
        self.run("replace_all", |conn, store| async move {
            conn.replace_all(&store, records).await
        })
        .await
    }

    async fn run<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(E::Connection, Rc<str>) -> Fut,
        Fut: std::future::Future<Output = EngineResult<T>>,
    {
        let connection = self.registry.ensure(&self.name).await?;
        f(connection, self.name.clone())
            .await
            .map_err(|source| Error::transaction(&self.name, op, source))
    }
}

/// `None`, `""` and `"auto"` all mean "let the engine pick".
fn resolve_key(key: Option<Key>) -> Option<Key> {
    match key {
        Some(Key::String(s)) if s.is_empty() || s == AUTO_KEY => None,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, MemoryEngine};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn table(name: &str) -> (MemoryEngine, Table<MemoryEngine>) {
        let engine = MemoryEngine::new();
        let registry = Rc::new(Registry::new(engine.clone(), "app"));
        (engine, Table::new(name, registry))
    }

    fn person(name: &str) -> Value {
        Value::from(json!({ "name": name }))
    }

    #[test]
    fn test_resolve_key() {
        assert_eq!(resolve_key(None), None);
        assert_eq!(resolve_key(Some(Key::from(""))), None);
        assert_eq!(resolve_key(Some(Key::from(AUTO_KEY))), None);
        assert_eq!(resolve_key(Some(Key::from("Auto"))), Some(Key::from("Auto")));
        assert_eq!(resolve_key(Some(Key::from(0))), Some(Key::from(0)));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let (_, users) = table("users");

        assert_eq!(users.get(1).await.unwrap(), None);
        assert_eq!(users.get("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (_, users) = table("users");

        let key = users.set(Some(Key::from("alice")), person("Alice")).await.unwrap();
        assert_eq!(key, Key::from("alice"));
        assert_eq!(users.get("alice").await.unwrap(), Some(person("Alice")));

        // overwrite
        users.set(Some(Key::from("alice")), person("Alicia")).await.unwrap();
        assert_eq!(users.get("alice").await.unwrap(), Some(person("Alicia")));
    }

    #[tokio::test]
    async fn test_auto_keys_increase() {
        let (_, users) = table("users");

        let first = users.set(Some(Key::from("auto")), person("A")).await.unwrap();
        let second = users.set(Some(Key::from("auto")), person("B")).await.unwrap();
        let third = users.insert(person("C")).await.unwrap();
        let fourth = users.set(Some(Key::from("")), person("D")).await.unwrap();

        assert_eq!(first, Key::from(1));
        assert_eq!(second, Key::from(2));
        assert!(first < second && second < third && third < fourth);
        assert_eq!(users.get("auto").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_explicit_then_auto_example() {
        let (_, users) = table("users");

        users.set(Some(Key::from(1)), person("Alice")).await.unwrap();
        users.set(Some(Key::from("auto")), person("Bob")).await.unwrap();

        assert_eq!(
            users.get_all().await.unwrap(),
            vec![
                Record::new(1, person("Alice")),
                Record::new(2, person("Bob")),
            ]
        );
    }

    #[tokio::test]
    async fn test_clear_empties_table() {
        let (_, users) = table("users");
        for i in 0..5 {
            users.insert(Value::from(i)).await.unwrap();
        }

        users.clear().await.unwrap();
        assert!(users.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_absent_key() {
        let (_, users) = table("users");
        users.set(Some(Key::from(1)), person("Alice")).await.unwrap();

        users.delete(42).await.unwrap();
        assert_eq!(users.get_all().await.unwrap().len(), 1);

        users.delete(1).await.unwrap();
        assert_eq!(users.get(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_all_key_order() {
        let (_, items) = table("items");
        items.set(Some(Key::from("b")), Value::from(1)).await.unwrap();
        items.set(Some(Key::from(10)), Value::from(2)).await.unwrap();
        items.set(Some(Key::from("a")), Value::from(3)).await.unwrap();
        items.set(Some(Key::from(2)), Value::from(4)).await.unwrap();

        let keys: Vec<Key> = items.get_all().await.unwrap().into_iter().map(|r| r.key).collect();
        assert_eq!(
            keys,
            vec![Key::from(2), Key::from(10), Key::from("a"), Key::from("b")]
        );
    }

    #[tokio::test]
    async fn test_transaction_error_keeps_registry() {
        let (engine, users) = table("users");
        users.insert(person("A")).await.unwrap();

        engine.fail_next_transaction("aborted");
        let err = users.insert(person("B")).await.unwrap_err();
        match err {
            Error::Transaction { table, op, source } => {
                assert_eq!(table, "users");
                assert_eq!(op, "add");
                assert_eq!(source, EngineError::Transaction("aborted".into()));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(users.insert(person("C")).await.unwrap(), Key::from(2));
        assert_eq!(engine.open_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_key_is_transaction_error() {
        let (_, users) = table("users");

        let err = users.get(Key::Number(f64::NAN)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transaction {
                source: EngineError::InvalidKey(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_replace_all() {
        let (_, users) = table("users");
        users.insert(person("old")).await.unwrap();

        users
            .replace_all(vec![
                Record::new("x", person("X")),
                Record::new(7, person("Seven")),
            ])
            .await
            .unwrap();

        assert_eq!(
            users.get_all().await.unwrap(),
            vec![Record::new(7, person("Seven")), Record::new("x", person("X"))]
        );
    }
}
