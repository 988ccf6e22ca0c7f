//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check codec, key validation and backend behaviour over
//! generated inputs.

use proptest::prelude::*;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::cache::{codec, resolve_ttl, validate_key, Cache, Ttl, RESERVED_KEY_CHARACTERS};
use crate::config::Config;
use crate::error::CacheError;
use crate::storage::{FileStorage, ProcessTable, SharedMemoryStorage, Storage};

// == Strategies ==
/// Generates valid cache keys
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_.-]{1,64}"
}

/// Generates keys containing at least one reserved character
fn reserved_key_strategy() -> impl Strategy<Value = String> {
    (
        "[a-z0-9]{0,16}",
        prop::sample::select(RESERVED_KEY_CHARACTERS.to_vec()),
        "[a-z0-9]{0,16}",
    )
        .prop_map(|(head, reserved, tail)| format!("{head}{reserved}{tail}"))
}

/// Generates nested structured values (no floats, they do not compare exactly)
fn structured_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        ".{0,24}".prop_map(Value::String),
    ];

    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..8)
                .prop_map(|map| Value::Object(map.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Value },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    // Small key space so operations collide
    let key = "[a-d]";
    prop_oneof![
        (key, structured_value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Delete { key }),
    ]
}

fn shared_storage() -> SharedMemoryStorage {
    SharedMemoryStorage::new(&Config::default(), Arc::new(ProcessTable::isolated())).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Decoding what was encoded yields the original value
    #[test]
    fn prop_codec_round_trip(value in structured_value_strategy()) {
        let bytes = codec::encode(&value).unwrap();
        prop_assert_eq!(codec::decode(&bytes).unwrap(), value);
    }

    // Dropping the last byte of an encoded container never decodes
    #[test]
    fn prop_codec_truncation_detected(
        items in prop::collection::vec(structured_value_strategy(), 0..6)
    ) {
        let bytes = codec::encode(&Value::Array(items)).unwrap();
        prop_assert!(codec::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn prop_valid_keys_accepted(key in valid_key_strategy()) {
        prop_assert!(validate_key(&key).is_ok());
    }

    #[test]
    fn prop_reserved_keys_rejected(key in reserved_key_strategy()) {
        let rejected = matches!(
            validate_key(&key),
            Err(CacheError::InvalidKey { character: Some(c), .. }) if RESERVED_KEY_CHARACTERS.contains(&c)
        );
        prop_assert!(rejected);
    }

    #[test]
    fn prop_seconds_resolve_to_themselves(seconds in 0i64..i64::MAX, default in any::<u64>()) {
        prop_assert_eq!(resolve_ttl(Some(Ttl::Seconds(seconds)), default).unwrap(), seconds as u64);
        prop_assert_eq!(resolve_ttl(None, default).unwrap(), default);
    }

    #[test]
    fn prop_negative_seconds_rejected(seconds in i64::MIN..0i64) {
        let rejected = matches!(
            resolve_ttl(Some(Ttl::Seconds(seconds)), 300),
            Err(CacheError::InvalidTtl(_))
        );
        prop_assert!(rejected);
    }

    // A value stored in the shared table reads back unchanged
    #[test]
    fn prop_shared_round_trip(key in valid_key_strategy(), value in structured_value_strategy()) {
        let storage = shared_storage();

        prop_assert!(storage.set(&key, &value, None).unwrap());
        prop_assert_eq!(storage.get(&key, Value::Null).unwrap(), value);
    }

    // The facade agrees with a plain map model for any operation sequence
    #[test]
    fn prop_facade_matches_model(ops in prop::collection::vec(cache_op_strategy(), 1..40)) {
        let cache = Cache::with_storage(Arc::new(shared_storage()));
        let mut model = std::collections::HashMap::new();
        let mut expected_hits = 0u64;
        let mut expected_misses = 0u64;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    prop_assert!(cache.set(&key, &value, None).unwrap());
                    model.insert(key, value);
                }
                CacheOp::Get { key } => {
                    let found = cache.fetch(&key).unwrap();
                    match model.get(&key) {
                        Some(_) => expected_hits += 1,
                        None => expected_misses += 1,
                    }
                    prop_assert_eq!(found.as_ref(), model.get(&key));
                }
                CacheOp::Delete { key } => {
                    let deleted = cache.delete(&key).unwrap();
                    prop_assert_eq!(deleted, model.remove(&key).is_some());
                }
            }
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
    }
}

// File backend cases touch the disk; fewer of them
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn prop_file_round_trip(key in valid_key_strategy(), value in structured_value_strategy()) {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.storages.file.path = dir.path().to_path_buf();
        let storage = FileStorage::local(&config).unwrap();

        prop_assert!(storage.set(&key, &value, None).unwrap());
        prop_assert_eq!(storage.get(&key, Value::Null).unwrap(), value);

        // Deleting twice succeeds both times
        prop_assert!(storage.delete(&key).unwrap());
        prop_assert!(storage.delete(&key).unwrap());
        prop_assert!(!storage.has(&key).unwrap());
    }
}
