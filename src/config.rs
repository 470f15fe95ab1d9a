//! Configuration Module
//!
//! Loads cache configuration from environment variables and builds the store.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use crate::backend::{MemoryBackend, SqliteBackend, StorageBackend};
use crate::cache::ExpiringStore;
use crate::error::{CacheError, Result};
use crate::key::{KeyBuilder, DEFAULT_KEY_VERSION, DEFAULT_MAX_KEY_LENGTH};

/// Which table implementation backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Sqlite,
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "sqlite" => Ok(BackendKind::Sqlite),
            other => Err(CacheError::Config(format!(
                "Unknown cache backend '{}', expected 'memory' or 'sqlite'",
                other
            ))),
        }
    }
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default TTL in seconds for entries without explicit TTL
    pub default_ttl: u64,
    /// Namespace prepended to every key
    pub key_prefix: String,
    /// Key version component
    pub key_version: u32,
    /// Maximum storage key length in bytes
    pub max_key_length: usize,
    /// Backend name as configured (`memory` or `sqlite`)
    pub backend: String,
    /// Database file for the SQLite backend
    pub sqlite_path: PathBuf,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `CACHE_KEY_PREFIX` - Key namespace (default: empty)
    /// - `CACHE_KEY_VERSION` - Key version (default: 1)
    /// - `CACHE_MAX_KEY_LENGTH` - Storage key limit in bytes (default: 250)
    /// - `CACHE_BACKEND` - `memory` or `sqlite` (default: memory)
    /// - `CACHE_SQLITE_PATH` - SQLite database file (default: cache.db)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl: parse_var("CACHE_DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            key_prefix: env::var("CACHE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            key_version: parse_var("CACHE_KEY_VERSION").unwrap_or(defaults.key_version),
            max_key_length: parse_var("CACHE_MAX_KEY_LENGTH").unwrap_or(defaults.max_key_length),
            backend: env::var("CACHE_BACKEND").unwrap_or(defaults.backend),
            sqlite_path: env::var("CACHE_SQLITE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.sqlite_path),
        }
    }

    /// Parses the configured backend name.
    pub fn backend_kind(&self) -> Result<BackendKind> {
        self.backend.parse()
    }

    pub fn key_builder(&self) -> KeyBuilder {
        KeyBuilder::new(self.key_prefix.clone(), self.key_version)
            .with_max_key_length(self.max_key_length)
    }

    /// Opens the configured backend and builds a store over it.
    pub fn build_store(&self) -> Result<ExpiringStore> {
        if self.default_ttl == 0 {
            return Err(CacheError::Config(
                "Default TTL must be greater than zero".to_string(),
            ));
        }

        let keys = self.key_builder();
        keys.make_key("k").map_err(|e| {
            CacheError::Config(format!(
                "Key prefix '{}' cannot form valid keys: {}",
                self.key_prefix, e
            ))
        })?;

        let backend: Arc<dyn StorageBackend> = match self.backend_kind()? {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            BackendKind::Sqlite => Arc::new(SqliteBackend::open(&self.sqlite_path)?),
        };

        info!(
            "Cache store initialized: backend={}, default_ttl={}s, prefix='{}', version={}",
            self.backend, self.default_ttl, self.key_prefix, self.key_version
        );
        Ok(ExpiringStore::new(backend, keys, self.default_ttl))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl: 300,
            key_prefix: String::new(),
            key_version: DEFAULT_KEY_VERSION,
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
            backend: "memory".to_string(),
            sqlite_path: PathBuf::from("cache.db"),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
