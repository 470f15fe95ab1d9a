//! Error types for the cache
//!
//! Provides unified error handling using thiserror. A miss is never an error;
//! it is reported through the caller's default or a `false`/`None` result.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Storage key or operation argument rejected before touching the store
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Value could not be encoded, or a stored value could not be decoded
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// The backing store failed or could not be reached
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Key required by a read-modify-write operation is absent
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::BackendUnavailable(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
