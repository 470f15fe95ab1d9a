//! Storage Backend Module
//!
//! The single keyed table the cache lives in. The store is handed a backend
//! at construction time; backends enforce key uniqueness and perform each
//! operation as one atomic step.
//!
//! # Backends
//! - [`MemoryBackend`] - process-local table
//! - [`SqliteBackend`] - SQLite table with `ON CONFLICT` upserts

mod memory;
mod sqlite;

use chrono::{DateTime, Utc};

use crate::cache::CacheEntry;
use crate::error::Result;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Row-level operations on the cache table.
///
/// Conditional operations take `now` from the caller so that expiry is
/// always judged by the store's clock, never the backend's.
pub trait StorageBackend: Send + Sync {
    /// Fetches the row for `key`, expired or not.
    fn get_row(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Inserts the row, or replaces value and expiry of an existing one.
    fn upsert_row(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> Result<()>;

    /// Writes the row only when no live row exists at `now`.
    ///
    /// An expired row counts as vacant and is replaced. Returns whether the
    /// write happened.
    fn insert_if_vacant(
        &self,
        key: &str,
        value: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Moves the expiry of a row that is still live at `now`.
    fn update_expiry(&self, key: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>)
        -> Result<bool>;

    /// Removes the row. Returns whether a row existed.
    fn delete_row(&self, key: &str) -> Result<bool>;

    /// Removes the row only if it is expired at `now`.
    ///
    /// A row rewritten by a concurrent `upsert_row` since it was read is
    /// left alone.
    fn delete_if_expired(&self, key: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Removes every row expired at `now`. Returns the number removed.
    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Removes every row. Returns the number removed.
    fn delete_all(&self) -> Result<usize>;

    /// Number of physical rows, expired ones included.
    fn row_count(&self) -> Result<usize>;
}
