//! Cache Module
//!
//! Expiring key-value store with lazy eviction over a pluggable table.

mod entry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{expires_at, CacheEntry};
pub use stats::CacheStats;
pub use store::ExpiringStore;
