//! Key Construction Module
//!
//! Combines a caller's logical key with the namespace prefix and version into
//! the storage key, and rejects storage keys the backend must never see.

use tracing::warn;

use crate::error::{CacheError, Result};

// == Public Constants ==
/// Default maximum storage key length in bytes
pub const DEFAULT_MAX_KEY_LENGTH: usize = 250;

/// Default key version
pub const DEFAULT_KEY_VERSION: u32 = 1;

// == Key Builder ==
/// Builds `"{prefix}:{version}:{key}"` storage keys.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    prefix: String,
    version: u32,
    max_key_length: usize,
}

impl KeyBuilder {
    pub fn new(prefix: impl Into<String>, version: u32) -> Self {
        Self {
            prefix: prefix.into(),
            version,
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
        }
    }

    /// Overrides the storage key length limit.
    pub fn with_max_key_length(mut self, max_key_length: usize) -> Self {
        self.max_key_length = max_key_length;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    // == Make Key ==
    /// Builds and validates the storage key using the configured version.
    pub fn make_key(&self, key: &str) -> Result<String> {
        self.make_key_with_version(key, self.version)
    }

    /// Builds and validates the storage key for an explicit version.
    pub fn make_key_with_version(&self, key: &str, version: u32) -> Result<String> {
        if key.is_empty() {
            return Err(CacheError::Validation("Key cannot be empty".to_string()));
        }

        let storage_key = format!("{}:{}:{}", self.prefix, version, key);
        self.validate(&storage_key)?;
        Ok(storage_key)
    }

    // == Validate ==
    /// Rejects keys that are too long or contain spaces or control characters.
    pub fn validate(&self, storage_key: &str) -> Result<()> {
        if storage_key.len() > self.max_key_length {
            warn!(
                len = storage_key.len(),
                max = self.max_key_length,
                "Rejected over-long cache key"
            );
            return Err(CacheError::Validation(format!(
                "Key exceeds maximum length of {} bytes",
                self.max_key_length
            )));
        }

        if let Some(bad) = storage_key.chars().find(|c| is_forbidden(*c)) {
            warn!(key = %storage_key.escape_debug(), "Rejected cache key with forbidden character");
            return Err(CacheError::Validation(format!(
                "Key contains forbidden character {:?}",
                bad
            )));
        }

        Ok(())
    }
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new("", DEFAULT_KEY_VERSION)
    }
}

fn is_forbidden(c: char) -> bool {
    (c as u32) < 33 || (c as u32) == 127
}
