//! Cache Entry Module
//!
//! Defines the stored row: storage key, encoded value and absolute expiry.

use chrono::{DateTime, Duration, Utc};

// == Cache Entry ==
/// One row of the cache table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Storage key (prefix and version already applied)
    pub key: String,
    /// Encoded value
    pub value: String,
    /// Instant after which the entry is logically absent
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry expiring `ttl_seconds` after `now`.
    pub fn new(key: String, value: String, now: DateTime<Utc>, ttl_seconds: u64) -> Self {
        Self {
            key,
            value,
            expires_at: expires_at(now, ttl_seconds),
        }
    }

    // == Is Expired ==
    /// Checks whether the entry has expired at `now`.
    ///
    /// Boundary condition: an entry is expired once `now >= expires_at`, so
    /// once the TTL has fully elapsed the entry is gone.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    // == Time To Live ==
    /// Remaining lifetime at `now`, clamped to zero.
    pub fn ttl_remaining(&self, now: DateTime<Utc>) -> Duration {
        if self.expires_at > now {
            self.expires_at - now
        } else {
            Duration::zero()
        }
    }
}

/// Computes `now + ttl_seconds`, rounded up to a whole millisecond and
/// saturating at the latest representable instant.
///
/// Every backend stores the same millisecond-aligned expiry, so an entry
/// never expires before its full TTL has elapsed.
pub fn expires_at(now: DateTime<Utc>, ttl_seconds: u64) -> DateTime<Utc> {
    i64::try_from(ttl_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .and_then(ceil_to_millis)
        .unwrap_or_else(latest_expiry)
}

fn ceil_to_millis(instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let millis = instant.timestamp_millis();
    let millis = if instant.timestamp_subsec_nanos() % 1_000_000 == 0 {
        millis
    } else {
        millis.checked_add(1)?
    };
    DateTime::from_timestamp_millis(millis)
}

fn latest_expiry() -> DateTime<Utc> {
    let max = DateTime::<Utc>::MAX_UTC;
    DateTime::from_timestamp_millis(max.timestamp_millis()).unwrap_or(max)
}
