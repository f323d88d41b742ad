//! SQLite-backed cache store. Survives restarts of the proxy.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::StoreError;

use super::key::owner_of;
use super::store::CacheStore;

/// Schema for the cache table.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_key TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    data BLOB NOT NULL,
    expires_at INTEGER NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_owner ON cache_entries(owner_id);
CREATE INDEX IF NOT EXISTS idx_cache_entries_expiry ON cache_entries(expires_at);
"#;

pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open or create the store at the given path.
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)?;
      }
    }

    let conn = Connection::open(path)?;
    Self::with_connection(conn)
  }

  /// In-memory database for tests.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self, StoreError> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self, StoreError> {
    conn.execute_batch(CACHE_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Default database location under the user's data directory.
  pub fn default_path() -> Option<PathBuf> {
    dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .map(|dir| dir.join("ghlist").join("cache.db"))
  }

  fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
    self.conn.lock().map_err(|_| StoreError::Poisoned)
  }
}

fn now_millis() -> i64 {
  Utc::now().timestamp_millis()
}

impl CacheStore for SqliteStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
    let conn = self.conn()?;

    let row: Option<(Vec<u8>, i64)> = conn
      .query_row(
        "SELECT data, expires_at FROM cache_entries WHERE cache_key = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?;

    match row {
      Some((data, expires_at)) if expires_at > now_millis() => Ok(Some(data)),
      Some(_) => {
        conn.execute(
          "DELETE FROM cache_entries WHERE cache_key = ?",
          params![key],
        )?;
        Ok(None)
      }
      None => Ok(None),
    }
  }

  fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
    let conn = self.conn()?;
    let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    let expires_at = now_millis().saturating_add(ttl_millis);
    let owner_id = owner_of(key).unwrap_or_default();

    conn.execute(
      "INSERT OR REPLACE INTO cache_entries (cache_key, owner_id, data, expires_at, stored_at)
       VALUES (?, ?, ?, ?, datetime('now'))",
      params![key, owner_id, value, expires_at],
    )?;

    Ok(())
  }

  fn delete(&self, key: &str) -> Result<(), StoreError> {
    let conn = self.conn()?;
    conn.execute(
      "DELETE FROM cache_entries WHERE cache_key = ?",
      params![key],
    )?;
    Ok(())
  }

  fn delete_owner(&self, owner_id: &str) -> Result<usize, StoreError> {
    let conn = self.conn()?;
    let removed = conn.execute(
      "DELETE FROM cache_entries WHERE owner_id = ?",
      params![owner_id],
    )?;
    Ok(removed)
  }

  fn clear(&self) -> Result<(), StoreError> {
    let conn = self.conn()?;
    conn.execute("DELETE FROM cache_entries", [])?;
    Ok(())
  }

  fn purge_expired(&self) -> Result<usize, StoreError> {
    let conn = self.conn()?;
    let removed = conn.execute(
      "DELETE FROM cache_entries WHERE expires_at <= ?",
      params![now_millis()],
    )?;
    Ok(removed)
  }

  fn kind(&self) -> &'static str {
    "sqlite"
  }
}
