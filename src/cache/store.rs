//! Cache Store Module
//!
//! The expiring key-value store: key construction, value encoding and lazy
//! eviction layered over an injected storage backend.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::backend::StorageBackend;
use crate::cache::entry::{self, CacheEntry};
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::error::{CacheError, Result};
use crate::key::KeyBuilder;

// == Expiring Store ==
/// Key-value cache whose entries expire at an absolute instant.
///
/// Expired entries are never returned; they are deleted the first time a read
/// observes them. There is no background sweep. The store is `Send + Sync`
/// and is meant to be built once and shared through an `Arc`.
pub struct ExpiringStore {
    /// Backing table
    backend: Arc<dyn StorageBackend>,
    /// Time source for expiry decisions
    clock: Arc<dyn Clock>,
    /// Namespace/version key builder
    keys: KeyBuilder,
    /// TTL in seconds applied when a write does not give one
    default_ttl: u64,
    /// Read/write counters
    stats: StatsRecorder,
}

impl std::fmt::Debug for ExpiringStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringStore")
            .field("keys", &self.keys)
            .field("default_ttl", &self.default_ttl)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl ExpiringStore {
    // == Constructor ==
    /// Creates a store over `backend` using the system clock.
    ///
    /// # Arguments
    /// * `backend` - Table the entries are kept in
    /// * `keys` - Namespace/version key builder
    /// * `default_ttl` - TTL in seconds for writes without an explicit TTL
    pub fn new(backend: Arc<dyn StorageBackend>, keys: KeyBuilder, default_ttl: u64) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            keys,
            default_ttl,
            stats: StatsRecorder::default(),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // == Get ==
    /// Returns the value stored under `key`, or `default` on a miss.
    ///
    /// An expired entry is deleted before `default` is returned.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.try_get(key)?.unwrap_or(default))
    }

    /// Returns the value stored under `key`, or `None` on a miss.
    pub fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let storage_key = self.keys.make_key(key)?;
        match self.load_live(&storage_key)? {
            Some(entry) => Ok(Some(decode_entry(&entry)?)),
            None => Ok(None),
        }
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl` seconds.
    ///
    /// `None` uses the default TTL. A TTL of zero means the value is already
    /// stale: any existing entry is removed and nothing is written. An
    /// existing entry has its value and expiry replaced in one upsert.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<u64>) -> Result<()> {
        let storage_key = self.keys.make_key(key)?;
        let encoded = codec::encode(value)?;
        self.write_encoded(&storage_key, &encoded, ttl)
    }

    // == Add ==
    /// Stores `value` only if `key` has no live entry. Returns whether it was
    /// written.
    pub fn add<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<u64>) -> Result<bool> {
        let storage_key = self.keys.make_key(key)?;
        let encoded = codec::encode(value)?;
        let ttl = self.effective_ttl(ttl);
        if ttl == 0 {
            return Ok(false);
        }

        let now = self.clock.now();
        let added = self.backend.insert_if_vacant(
            &storage_key,
            &encoded,
            entry::expires_at(now, ttl),
            now,
        )?;
        if added {
            self.stats.record_write();
        }
        debug!(key = %storage_key, added, "Cache add");
        Ok(added)
    }

    // == Touch ==
    /// Resets the expiry of a live entry to `ttl` seconds from now. Returns
    /// false on a miss; an expired entry found is deleted.
    pub fn touch(&self, key: &str, ttl: Option<u64>) -> Result<bool> {
        let storage_key = self.keys.make_key(key)?;
        let now = self.clock.now();
        let expires_at = entry::expires_at(now, self.effective_ttl(ttl));
        if self.backend.update_expiry(&storage_key, expires_at, now)? {
            debug!(key = %storage_key, "Cache touch");
            return Ok(true);
        }

        self.evict_if_expired(&storage_key, now)?;
        Ok(false)
    }

    // == Delete ==
    /// Removes the entry for `key`. Absent keys are not an error.
    pub fn delete(&self, key: &str) -> Result<()> {
        let storage_key = self.keys.make_key(key)?;
        let existed = self.backend.delete_row(&storage_key)?;
        debug!(key = %storage_key, existed, "Cache delete");
        Ok(())
    }

    // == Clear ==
    /// Removes every entry.
    pub fn clear(&self) -> Result<()> {
        let removed = self.backend.delete_all()?;
        info!(removed, "Cache cleared");
        Ok(())
    }

    // == Has Key ==
    /// Returns true only for a live entry. An expired entry is deleted.
    pub fn has_key(&self, key: &str) -> Result<bool> {
        let storage_key = self.keys.make_key(key)?;
        Ok(self.load_live(&storage_key)?.is_some())
    }

    // == Bulk Operations ==
    /// Fetches the live entries among `keys`, keyed by the caller's key.
    ///
    /// Every key is validated before the first lookup.
    pub fn get_many<T, I, K>(&self, keys: I) -> Result<HashMap<String, T>>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let resolved = self.resolve_keys(keys)?;
        let mut found = HashMap::with_capacity(resolved.len());
        for (key, storage_key) in resolved {
            if let Some(entry) = self.load_live(&storage_key)? {
                found.insert(key, decode_entry(&entry)?);
            }
        }
        Ok(found)
    }

    /// Stores every pair with the same TTL.
    ///
    /// Keys and values are all validated and encoded first, so a rejected
    /// pair means nothing is written.
    pub fn set_many<T, I, K>(&self, entries: I, ttl: Option<u64>) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
    {
        let prepared = entries
            .into_iter()
            .map(|(key, value)| -> Result<(String, String)> {
                let storage_key = self.keys.make_key(key.as_ref())?;
                Ok((storage_key, codec::encode(&value)?))
            })
            .collect::<Result<Vec<_>>>()?;

        for (storage_key, encoded) in prepared {
            self.write_encoded(&storage_key, &encoded, ttl)?;
        }
        Ok(())
    }

    /// Removes every key in `keys`.
    pub fn delete_many<I, K>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        for (_, storage_key) in self.resolve_keys(keys)? {
            self.backend.delete_row(&storage_key)?;
        }
        Ok(())
    }

    // == Counters ==
    /// Adds `delta` to the integer stored under `key`, keeping its expiry.
    ///
    /// The read and the write are separate backend calls, so concurrent
    /// increments of the same key can lose updates.
    pub fn incr(&self, key: &str, delta: i64) -> Result<i64> {
        let storage_key = self.keys.make_key(key)?;
        let entry = self
            .load_live(&storage_key)?
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;

        let current = decode_entry::<serde_json::Value>(&entry)?
            .as_i64()
            .ok_or_else(|| {
                CacheError::Validation(format!("Value for '{}' is not an integer", key))
            })?;
        let next = current.checked_add(delta).ok_or_else(|| {
            CacheError::Validation(format!("Incrementing '{}' overflows", key))
        })?;

        self.backend
            .upsert_row(&storage_key, &codec::encode(&next)?, entry.expires_at)?;
        self.stats.record_write();
        Ok(next)
    }

    /// Subtracts `delta` from the integer stored under `key`.
    pub fn decr(&self, key: &str, delta: i64) -> Result<i64> {
        let negated = delta.checked_neg().ok_or_else(|| {
            CacheError::Validation(format!("Decrementing '{}' overflows", key))
        })?;
        self.incr(key, negated)
    }

    // == Maintenance ==
    /// Deletes every expired entry. Returns how many were removed.
    ///
    /// Never called by the store itself; hosts that want a sweep decide when.
    pub fn purge_expired(&self) -> Result<usize> {
        let removed = self.backend.delete_expired(self.clock.now())?;
        self.stats.record_purged(removed);
        if removed > 0 {
            info!("Purged {} expired cache entries", removed);
        } else {
            debug!("Purge found no expired cache entries");
        }
        Ok(removed)
    }

    // == Introspection ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Number of stored rows, including expired rows not yet evicted.
    pub fn len(&self) -> Result<usize> {
        self.backend.row_count()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    pub fn keys(&self) -> &KeyBuilder {
        &self.keys
    }

    // == Internals ==
    fn effective_ttl(&self, ttl: Option<u64>) -> u64 {
        ttl.unwrap_or(self.default_ttl)
    }

    fn write_encoded(&self, storage_key: &str, encoded: &str, ttl: Option<u64>) -> Result<()> {
        let ttl = self.effective_ttl(ttl);
        if ttl == 0 {
            self.backend.delete_row(storage_key)?;
            debug!(key = %storage_key, "Zero TTL write removed entry");
            return Ok(());
        }

        let expires_at = entry::expires_at(self.clock.now(), ttl);
        self.backend.upsert_row(storage_key, encoded, expires_at)?;
        self.stats.record_write();
        debug!(key = %storage_key, ttl, "Cache set");
        Ok(())
    }

    fn resolve_keys<I, K>(&self, keys: I) -> Result<Vec<(String, String)>>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        keys.into_iter()
            .map(|key| -> Result<(String, String)> {
                let key = key.as_ref();
                Ok((key.to_string(), self.keys.make_key(key)?))
            })
            .collect()
    }

    // Conditional delete: a fresh write since our read survives
    fn evict_if_expired(&self, storage_key: &str, now: DateTime<Utc>) -> Result<()> {
        if self.backend.delete_if_expired(storage_key, now)? {
            self.stats.record_lazy_eviction();
            debug!(key = %storage_key, "Evicted expired cache entry");
        }
        Ok(())
    }

    /// Reads a row and applies lazy eviction.
    fn load_live(&self, storage_key: &str) -> Result<Option<CacheEntry>> {
        let now = self.clock.now();
        match self.backend.get_row(storage_key)? {
            Some(entry) if entry.is_expired_at(now) => {
                self.evict_if_expired(storage_key, now)?;
                self.stats.record_miss();
                Ok(None)
            }
            Some(entry) => {
                self.stats.record_hit();
                debug!(key = %storage_key, "Cache hit");
                Ok(Some(entry))
            }
            None => {
                self.stats.record_miss();
                debug!(key = %storage_key, "Cache miss");
                Ok(None)
            }
        }
    }
}

fn decode_entry<T: DeserializeOwned>(entry: &CacheEntry) -> Result<T> {
    codec::decode(&entry.value).map_err(|e| {
        warn!(key = %entry.key, error = %e, "Stored cache value could not be decoded");
        e
    })
}
