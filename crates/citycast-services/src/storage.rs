//! Persistent key-value storage for the saved-city list.

use anyhow::{Context, Result};
use citycast_core::RusqliteErrorExt;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

/// String blobs stored under string keys.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// SQLite-backed store, one row per key.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create storage directory")?;
        }
        let conn = Connection::open(path)
            .map_err(RusqliteErrorExt::into_database_error)
            .context("Failed to open storage database")?;
        Self::with_connection(conn)
    }

    /// In-memory database, gone when dropped
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(RusqliteErrorExt::into_database_error)
            .context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(RusqliteErrorExt::into_database_error)
        .context("Failed to initialize schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .map_err(RusqliteErrorExt::into_database_error)
        .context("Failed to read stored value")
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(RusqliteErrorExt::into_database_error)
        .context("Failed to write stored value")?;
        Ok(())
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::default();
        store.entries.lock().insert(key.to_string(), value.to_string());
        store
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citycast_core::DatabaseError;

    #[test]
    fn test_sqlite_get_missing_key() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.get("cities").unwrap(), None);
    }

    #[test]
    fn test_sqlite_set_overwrites() {
        let store = SqliteStore::in_memory().unwrap();
        store.set("cities", "[]").unwrap();
        store.set("cities", "[1]").unwrap();
        assert_eq!(store.get("cities").unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn test_sqlite_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("citycast.db");

        SqliteStore::open(&path).unwrap().set("cities", "saved").unwrap();

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get("cities").unwrap().as_deref(), Some("saved"));
    }

    #[test]
    fn test_sqlite_errors_carry_database_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("citycast.db");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();

        let Err(err) = SqliteStore::open(&path) else {
            unreachable!("a non-database file must not open");
        };
        let db = err.downcast_ref::<DatabaseError>();
        assert!(db.is_some(), "unexpected error: {:#}", err);
        assert!(db.unwrap().user_message().contains("cities"));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::with_entry("a", "1");
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.set("b", "2").unwrap();
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
        assert_eq!(store.get("c").unwrap(), None);
    }
}
