//! Key/value persistence port and its backends.
//!
//! Components never talk to storage directly: the engine snapshots their
//! state to JSON and writes it through [`KeyValueStore`] after every
//! mutation. The port is injected so tests run against [`MemoryStore`] and
//! production against [`SqliteStore`]; read-after-write consistency for the
//! same key is assumed of any backend.

use rusqlite::{params, Connection};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::StorageError;

/// Returns `~/.config/driftguard[-dev]/` based on DRIFTGUARD_ENV.
///
/// Set DRIFTGUARD_ENV=dev to use a development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("DRIFTGUARD_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("driftguard-dev")
    } else {
        base_dir.join("driftguard")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Storage port: `get(key) -> blob | none`, `set(key, blob) -> ack`.
///
/// A returned `Ok` from `set` is the durability acknowledgement; the engine
/// treats an `Err` as "not durable" and retries on the next mutation.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// SQLite-backed store at `~/.config/driftguard/driftguard.db`.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the store, creating the database file and schema if needed.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?
            .join("driftguard.db");
        let conn = Connection::open(&path).map_err(|source| StorageError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory store (for tests).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
            .map_err(StorageError::from)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM kv WHERE key = ?1")
            .map_err(StorageError::from)?;
        let mut rows = stmt.query(params![key]).map_err(StorageError::from)?;
        match rows.next().map_err(StorageError::from)? {
            Some(row) => Ok(Some(row.get(0).map_err(StorageError::from)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }
}

/// In-memory store for tests and for degraded operation when the real
/// backend cannot be opened.
#[derive(Default)]
pub struct MemoryStore {
    map: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.map.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.map.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store that fails every write; used to test degraded-mode behavior.
#[cfg(test)]
pub struct FailingStore;

#[cfg(test)]
impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::QueryFailed("write refused".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_get_set_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        assert_eq!(store.get("missing").unwrap(), None);
        store.set("streak", "{\"current\":3}").unwrap();
        assert_eq!(store.get("streak").unwrap().as_deref(), Some("{\"current\":3}"));

        // Overwrite is read-after-write consistent.
        store.set("streak", "{\"current\":4}").unwrap();
        assert_eq!(store.get("streak").unwrap().as_deref(), Some("{\"current\":4}"));
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn sqlite_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        {
            let conn = Connection::open(&path).unwrap();
            let store = SqliteStore { conn };
            store.migrate().unwrap();
            store.set("k", "v").unwrap();
        }
        let conn = Connection::open(&path).unwrap();
        let store = SqliteStore { conn };
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }
}
