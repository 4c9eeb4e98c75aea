//! Namespaced key-value local store.
//!
//! The store is an injected port: the engine takes `&dyn KvStore` so
//! tests run against [`MemoryStore`] and the application against
//! [`SqliteStore`]. Corrupt or missing values fall back silently to the
//! caller-provided default; a read never fails.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::logging::{log, obj, v_str, Domain, Level};

pub trait KvStore: Send + Sync {
    fn read_raw(&self, key: &str) -> Option<String>;
    fn write_raw(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read and deserialize, falling back on any missing or corrupt value.
pub fn read_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str, fallback: T) -> T {
    match store.read_raw(key) {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                log(
                    Level::Warn,
                    Domain::Store,
                    "corrupt_value",
                    obj(&[("key", v_str(key)), ("error", v_str(&e.to_string()))]),
                );
                fallback
            }
        },
        None => fallback,
    }
}

pub fn write_json<T: Serialize>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    store.write_raw(key, &serde_json::to_string(value)?)
}

/// SQLite-backed store: one `kv` table, keys prefixed with a namespace.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    namespace: String,
}

impl SqliteStore {
    pub fn new(path: &str, namespace: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn: Mutex::new(conn), namespace: namespace.to_string() })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

impl KvStore for SqliteStore {
    fn read_raw(&self, key: &str) -> Option<String> {
        let conn = self.conn.lock().ok()?;
        conn.query_row(
            "SELECT value FROM kv WHERE key = ?1",
            params![self.namespaced(key)],
            |row| row.get(0),
        )
        .ok()
    }

    fn write_raw(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![self.namespaced(key), value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![self.namespaced(key)])?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn read_raw(&self, key: &str) -> Option<String> {
        self.map.lock().ok()?.get(key).cloned()
    }

    fn write_raw(&self, key: &str, value: &str) -> Result<()> {
        self.map
            .lock()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.map
            .lock()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?
            .remove(key);
        Ok(())
    }
}
