//! SQLite-backed key-value store with WAL for crash-safe persistence

use std::path::Path;
use std::sync::Mutex;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use crate::traits::{KeyValueStore, StoreError, StoreTxn};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv_store (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );";

const UPSERT: &str = "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)";

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::DatabaseError(e.to_string())
}

fn read_value(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
    conn.query_row("SELECT value FROM kv_store WHERE key = ?1", params![key], |row| row.get(0))
        .optional()
        .map_err(db_err)
}

/// View handed to [`KeyValueStore::transact`] bodies; `conn` is inside an
/// open IMMEDIATE transaction.
struct SqliteTxn<'c> {
    conn: &'c Connection,
    now: i64,
    writes: usize,
}

impl StoreTxn for SqliteTxn<'_> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        read_value(self.conn, key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(UPSERT, params![key, value, self.now]).map_err(db_err)?;
        self.writes += 1;
        Ok(())
    }
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store database
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;

        // WAL keeps the last committed state intact if we die mid-write
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA wal_autocheckpoint = 1000;
             PRAGMA busy_timeout = 5000;"
        ).map_err(db_err)?;

        conn.execute_batch(SCHEMA).map_err(db_err)?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// All keys currently stored, sorted
    #[cfg(test)]
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT key FROM kv_store ORDER BY key").map_err(db_err)?;
        let keys = stmt
            .query_map([], |row| row.get(0))
            .map_err(db_err)?
            .filter_map(Result::ok)
            .collect();
        Ok(keys)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().unwrap();
        read_value(&conn, key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        let conn = self.conn.lock().unwrap();
        conn.execute(UPSERT, params![key, value, now]).map_err(db_err)?;
        tracing::debug!(key = %key, bytes = value.len(), "Store set");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
            .map_err(db_err)?;
        tracing::debug!(key = %key, existed = rows > 0, "Store delete");
        Ok(rows > 0)
    }

    // IMMEDIATE takes the database write lock before the first read, so a
    // second connection on the same file waits (up to busy_timeout) instead
    // of interleaving its own read-modify-write.
    fn transact(&self, body: &mut dyn FnMut(&mut dyn StoreTxn) -> Result<(), StoreError>) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;
        let mut view = SqliteTxn { conn: &tx, now: chrono::Utc::now().timestamp(), writes: 0 };
        body(&mut view)?;
        let writes = view.writes;
        tx.commit().map_err(db_err)?;
        tracing::debug!(writes, "Store transaction committed");
        Ok(())
    }
}
