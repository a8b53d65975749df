//! Opaque key-value persistence used by the template store

use miette::Diagnostic;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;
use thiserror::Error;

/// String slots read at startup and rewritten wholesale after mutations
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;
}

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    #[diagnostic(code(ntk::store::io))]
    Io(String),

    #[error("sqlite error: {0}")]
    #[diagnostic(code(ntk::store::sqlite))]
    Sqlite(#[from] rusqlite::Error),

    #[error("could not encode stored value: {0}")]
    #[diagnostic(code(ntk::store::encoding))]
    Encoding(String),

    #[error("store lock poisoned")]
    #[diagnostic(code(ntk::store::lock))]
    Lock,
}

/// In-process store for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::Lock)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Lock)?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::Lock)?;
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// SQLite-backed store, one `kv` table
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM kv WHERE substr(key, 1, ?2) = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![prefix, prefix.chars().count() as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("ntk.templates").unwrap(), None);
        store.set("ntk.templates", "[]").unwrap();
        store.set("ntk.categories", "[1]").unwrap();
        store.set("other", "x").unwrap();
        store.set("ntk.templates", "[2]").unwrap();
        assert_eq!(store.get("ntk.templates").unwrap().as_deref(), Some("[2]"));
        let keys: Vec<String> = store.scan("ntk.").unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["ntk.categories", "ntk.templates"]);
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_sqlite_store() {
        exercise(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_sqlite_store_persists() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join(".ntk/store.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("ntk.templates", "[]").unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("ntk.templates").unwrap().as_deref(), Some("[]"));
    }
}
