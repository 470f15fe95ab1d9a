//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store's observable guarantees over generated
//! keys, values and operation sequences.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use serde_json::Value;

use crate::backend::{MemoryBackend, SqliteBackend, StorageBackend};
use crate::cache::ExpiringStore;
use crate::clock::ManualClock;
use crate::codec;
use crate::error::CacheError;
use crate::key::KeyBuilder;

// == Test Configuration ==
const TEST_DEFAULT_TTL: u64 = 300;

fn memory_store() -> (ExpiringStore, ManualClock) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let store = ExpiringStore::new(
        Arc::new(MemoryBackend::new()),
        KeyBuilder::new("prop", 1),
        TEST_DEFAULT_TTL,
    )
    .with_clock(Arc::new(clock.clone()));
    (store, clock)
}

// == Strategies ==
/// Generates valid cache keys (non-empty, printable, within length limit)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:.-]{1,64}"
}

/// Generates arbitrary JSON values, nested up to a few levels
fn json_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        (-1.0e12f64..1.0e12f64).prop_map(Value::from),
        ".{0,24}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            prop::collection::hash_map(".{0,12}", inner, 0..8)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: i64, ttl: u64 },
    Get { key: String },
    Delete { key: String },
    Advance { secs: i64 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    let key = "[a-d]";
    prop_oneof![
        (key, any::<i64>(), 1u64..20).prop_map(|(key, value, ttl)| CacheOp::Set {
            key: key.to_string(),
            value,
            ttl
        }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Delete { key }),
        (0i64..10).prop_map(|secs| CacheOp::Advance { secs }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // A key that was never written is a miss and reports the default.
    #[test]
    fn prop_unwritten_key_is_miss(key in valid_key_strategy(), default in any::<i64>()) {
        let (store, _) = memory_store();

        prop_assert_eq!(store.get(&key, default).unwrap(), default);
        prop_assert!(!store.has_key(&key).unwrap());
    }

    // Storing a value and reading it back before expiry returns the same value.
    #[test]
    fn prop_roundtrip_storage(
        key in valid_key_strategy(),
        value in json_value_strategy(),
        ttl in 1u64..100_000
    ) {
        let (store, _) = memory_store();

        store.set(&key, &value, Some(ttl)).unwrap();

        prop_assert_eq!(store.get(&key, Value::Null).unwrap(), value);
        prop_assert!(store.has_key(&key).unwrap());
    }

    // Overwriting leaves one row holding the second value.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in json_value_strategy(),
        value2 in json_value_strategy()
    ) {
        let (store, _) = memory_store();

        store.set(&key, &value1, Some(10)).unwrap();
        store.set(&key, &value2, Some(20)).unwrap();

        prop_assert_eq!(store.get(&key, Value::Null).unwrap(), value2);
        prop_assert_eq!(store.len().unwrap(), 1);
    }

    // After clear, no previously written key is present.
    #[test]
    fn prop_clear_empties_store(keys in prop::collection::hash_set(valid_key_strategy(), 1..30)) {
        let (store, _) = memory_store();

        for key in &keys {
            store.set(key, key, None).unwrap();
        }
        store.clear().unwrap();

        for key in &keys {
            prop_assert!(!store.has_key(key).unwrap());
        }
        prop_assert!(store.is_empty().unwrap());
    }

    // Encoding then decoding any JSON value yields the same value.
    #[test]
    fn prop_codec_roundtrip(value in json_value_strategy()) {
        let text = codec::encode(&value).unwrap();
        let decoded: Value = codec::decode(&text).unwrap();
        prop_assert_eq!(decoded, value);
    }

    // Keys carrying whitespace or control characters never reach the backend.
    #[test]
    fn prop_forbidden_keys_rejected(
        head in "[a-z]{0,8}",
        bad in prop::sample::select(vec![' ', '\t', '\n', '\r', '\u{0}', '\u{7f}']),
        tail in "[a-z]{0,8}"
    ) {
        let (store, _) = memory_store();
        let key = format!("{}{}{}", head, bad, tail);

        prop_assert!(matches!(store.set(&key, &1, None), Err(CacheError::Validation(_))));
        prop_assert!(matches!(store.has_key(&key), Err(CacheError::Validation(_))));
        prop_assert!(store.is_empty().unwrap());
    }

    // The store agrees with a model map that tracks expiry by hand, and no
    // expired entry is ever returned.
    #[test]
    fn prop_matches_expiring_model(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let (store, clock) = memory_store();
        let mut model: HashMap<String, (i64, i64)> = HashMap::new();
        let mut elapsed: i64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value, ttl } => {
                    store.set(&key, &value, Some(ttl)).unwrap();
                    model.insert(key, (value, elapsed + ttl as i64));
                }
                CacheOp::Get { key } => {
                    let expected = model
                        .get(&key)
                        .filter(|(_, expires)| elapsed < *expires)
                        .map(|(value, _)| *value);
                    let actual: Option<i64> = store.try_get(&key).unwrap();
                    prop_assert_eq!(actual, expected);
                }
                CacheOp::Delete { key } => {
                    store.delete(&key).unwrap();
                    model.remove(&key);
                }
                CacheOp::Advance { secs } => {
                    clock.advance_secs(secs);
                    elapsed += secs;
                }
            }
        }
    }
}

// SQLite-backed runs are slower; fewer cases.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn prop_sqlite_roundtrip_and_overwrite(
        key in valid_key_strategy(),
        value1 in json_value_strategy(),
        value2 in json_value_strategy()
    ) {
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        let store = ExpiringStore::new(backend.clone(), KeyBuilder::default(), TEST_DEFAULT_TTL);

        store.set(&key, &value1, None).unwrap();
        prop_assert_eq!(store.get(&key, Value::Null).unwrap(), value1);

        store.set(&key, &value2, None).unwrap();
        prop_assert_eq!(store.get(&key, Value::Null).unwrap(), value2);
        prop_assert_eq!(backend.row_count().unwrap(), 1);
    }
}
