//! Expiring KV - a table-backed key-value cache
//!
//! Values are JSON-encoded, keyed by namespaced strings and carry an absolute
//! expiry. Expired entries are evicted lazily when a read observes them.

pub mod backend;
pub mod cache;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod key;
pub mod telemetry;

pub use backend::{MemoryBackend, SqliteBackend, StorageBackend};
pub use cache::{CacheEntry, CacheStats, ExpiringStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{CacheError, Result};
pub use key::KeyBuilder;
pub use telemetry::init_tracing;
