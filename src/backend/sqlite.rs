//! SQLite cache table.
//!
//! Rows live in `cache_entries` with the storage key as primary key and the
//! expiry stored as Unix milliseconds. Writers that race on a key are resolved
//! by SQLite's `ON CONFLICT` clause rather than by locking in this crate.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::StorageBackend;
use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cache_entries (
        key        TEXT PRIMARY KEY NOT NULL,
        value      TEXT NOT NULL,
        expires_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at ON cache_entries(expires_at);
";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Cache table stored in a SQLite database.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens (creating if needed) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            CacheError::BackendUnavailable(format!(
                "Failed to open database {}: {}",
                path.display(),
                e
            ))
        })?;
        info!(path = %path.display(), "Opened SQLite cache table");
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn to_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        CacheError::BackendUnavailable(format!("Stored expiry {} is out of range", millis))
    })
}

impl StorageBackend for SqliteBackend {
    fn get_row(&self, key: &str) -> Result<Option<CacheEntry>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT value, expires_at FROM cache_entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        match row {
            Some((value, expires_at)) => Ok(Some(CacheEntry {
                key: key.to_string(),
                value,
                expires_at: from_millis(expires_at)?,
            })),
            None => Ok(None),
        }
    }

    fn upsert_row(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at",
            params![key, value, to_millis(expires_at)],
        )?;
        Ok(())
    }

    fn insert_if_vacant(
        &self,
        key: &str,
        value: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
             WHERE cache_entries.expires_at <= ?4",
            params![key, value, to_millis(expires_at), to_millis(now)],
        )?;
        Ok(changed > 0)
    }

    fn update_expiry(
        &self,
        key: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE cache_entries SET expires_at = ?2 WHERE key = ?1 AND expires_at > ?3",
            params![key, to_millis(expires_at), to_millis(now)],
        )?;
        Ok(changed > 0)
    }

    fn delete_row(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(changed > 0)
    }

    fn delete_if_expired(&self, key: &str, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "DELETE FROM cache_entries WHERE key = ?1 AND expires_at <= ?2",
            params![key, to_millis(now)],
        )?;
        Ok(changed > 0)
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "DELETE FROM cache_entries WHERE expires_at <= ?1",
            params![to_millis(now)],
        )?;
        Ok(changed)
    }

    fn delete_all(&self) -> Result<usize> {
        let conn = self.conn.lock();
        Ok(conn.execute("DELETE FROM cache_entries", [])?)
    }

    fn row_count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
