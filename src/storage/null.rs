//! Null Backend
//!
//! Stores nothing. Reads miss and every write reports failure.

use serde_json::Value;

use crate::cache::{validate_key, Ttl};
use crate::error::Result;
use crate::storage::Storage;

/// Backend used when no real medium is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStorage;

impl Storage for NullStorage {
    fn name(&self) -> &'static str {
        "null"
    }

    fn fetch(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        Ok(None)
    }

    fn set(&self, key: &str, _value: &Value, _ttl: Option<Ttl>) -> Result<bool> {
        validate_key(key)?;
        Ok(false)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(false)
    }

    fn clear(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use serde_json::json;

    #[test]
    fn test_everything_fails_or_misses() {
        let storage = NullStorage;

        assert!(!storage.set("key", &json!("value"), None).unwrap());
        assert_eq!(storage.get("key", json!("bar")).unwrap(), json!("bar"));
        assert!(!storage.has("key").unwrap());
        assert!(!storage.delete("key").unwrap());
        assert!(!storage.clear());
        assert_eq!(storage.prune_expired(), 0);
    }

    #[test]
    fn test_keys_still_validated() {
        assert!(matches!(
            NullStorage.get("", json!(null)),
            Err(CacheError::InvalidKey { .. })
        ));
        assert!(matches!(
            NullStorage.set("a:b", &json!(1), None),
            Err(CacheError::InvalidKey { .. })
        ));
    }
}
