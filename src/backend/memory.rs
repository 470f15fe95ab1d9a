//! In-process cache table.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::StorageBackend;
use crate::cache::CacheEntry;
use crate::error::Result;

/// `HashMap` table guarded by a single lock; every operation is one critical
/// section, which gives the per-row atomicity the store relies on.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    rows: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get_row(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.rows.read().get(key).cloned())
    }

    fn upsert_row(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let entry = CacheEntry {
            key: key.to_string(),
            value: value.to_string(),
            expires_at,
        };
        self.rows.write().insert(key.to_string(), entry);
        Ok(())
    }

    fn insert_if_vacant(
        &self,
        key: &str,
        value: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut rows = self.rows.write();
        if let Some(existing) = rows.get(key) {
            if !existing.is_expired_at(now) {
                return Ok(false);
            }
        }

        rows.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    fn update_expiry(
        &self,
        key: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut rows = self.rows.write();
        match rows.get_mut(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                entry.expires_at = expires_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_row(&self, key: &str) -> Result<bool> {
        Ok(self.rows.write().remove(key).is_some())
    }

    fn delete_if_expired(&self, key: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut rows = self.rows.write();
        let expired = rows
            .get(key)
            .map(|entry| entry.is_expired_at(now))
            .unwrap_or(false);
        if expired {
            rows.remove(key);
        }
        Ok(expired)
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|_, entry| !entry.is_expired_at(now));
        Ok(before - rows.len())
    }

    fn delete_all(&self) -> Result<usize> {
        let mut rows = self.rows.write();
        let count = rows.len();
        rows.clear();
        Ok(count)
    }

    fn row_count(&self) -> Result<usize> {
        Ok(self.rows.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::contract;

    #[test]
    fn test_memory_backend_contract() {
        contract::run_all(|| Box::new(MemoryBackend::new()));
    }

    #[test]
    fn test_memory_backend_starts_empty() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.row_count().unwrap(), 0);
    }
}
