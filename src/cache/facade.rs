//! Cache Facade
//!
//! Routes every call to the configured storage backend and counts hits,
//! misses and writes along the way.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::cache::{validate_key, CacheStats, StatsRecorder, Ttl};
use crate::config::Config;
use crate::error::Result;
use crate::storage::{self, NullStorage, Storage};

// == Cache ==
/// Uniform front over whichever [`Storage`] is active.
#[derive(Debug)]
pub struct Cache {
    storage: Arc<dyn Storage>,
    stats: StatsRecorder,
}

impl Cache {
    // == Constructors ==
    /// Creates a cache over the backend selected by `config.driver`.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_storage(storage::from_config(config)?))
    }

    /// Creates a cache over an already built backend.
    pub fn with_storage(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            stats: StatsRecorder::new(),
        }
    }

    /// Active backend.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    // == Get ==
    /// Returns the value for `key`, or `default` on a miss.
    pub fn get(&self, key: &str, default: Value) -> Result<Value> {
        Ok(self.fetch(key)?.unwrap_or(default))
    }

    /// Returns the value for `key`, `None` on a miss.
    pub fn fetch(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;

        let value = self.storage.fetch(key)?;
        match value {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        Ok(value)
    }

    /// Typed read. A stored value of another shape counts as a miss.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.fetch(key)? else {
            return Ok(None);
        };

        match serde_json::from_value(value) {
            Ok(typed) => Ok(Some(typed)),
            Err(err) => {
                warn!(key, error = %err, "cached value has an unexpected shape");
                Ok(None)
            }
        }
    }

    // == Set ==
    /// Stores `value` for `ttl`, backend default when `None`.
    pub fn set(&self, key: &str, value: &Value, ttl: Option<Ttl>) -> Result<bool> {
        validate_key(key)?;

        let accepted = self.storage.set(key, value, ttl)?;
        self.stats.record_write(accepted);
        Ok(accepted)
    }

    /// Typed write.
    pub fn set_as<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Ttl>) -> Result<bool> {
        validate_key(key)?;

        match serde_json::to_value(value) {
            Ok(value) => self.set(key, &value, ttl),
            Err(err) => {
                warn!(key, error = %err, "value could not be converted for caching");
                self.stats.record_write(false);
                Ok(false)
            }
        }
    }

    // == Delete ==
    /// Removes `key`.
    pub fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;

        let deleted = self.storage.delete(key)?;
        if deleted {
            self.stats.record_delete();
        }
        Ok(deleted)
    }

    /// Removes every entry of the backend.
    pub fn clear(&self) -> bool {
        self.storage.clear()
    }

    /// Advisory existence check; see [`Storage::has`].
    pub fn has(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        self.storage.has(key)
    }

    /// Physically removes expired entries.
    pub fn prune_expired(&self) -> usize {
        self.storage.prune_expired()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}

impl Default for Cache {
    /// Cache over [`NullStorage`].
    fn default() -> Self {
        Self::with_storage(Arc::new(NullStorage))
    }
}
