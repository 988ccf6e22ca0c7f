//! Storage Backends
//!
//! One type per medium behind the [`Storage`] trait:
//! - [`SharedMemoryStorage`]: process-wide table with its own TTL bookkeeping
//! - [`FileStorage`]: one file per entry, modification time is the expiry
//! - [`NullStorage`]: stores nothing
//!
//! Backends hold no cache state of their own; the medium is the source of truth.

mod file;
mod memory;
mod null;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::cache::Ttl;
use crate::config::{Config, Driver};
use crate::error::Result;

pub use file::{FileStorage, Filesystem, LocalFilesystem};
pub use memory::{ProcessTable, SharedMemory, SharedMemoryStorage};
pub use null::NullStorage;

// == Storage Trait ==
/// Contract every backend implements.
///
/// Operations taking a key validate it first and fail with
/// [`CacheError::InvalidKey`](crate::error::CacheError::InvalidKey). Medium
/// failures never surface as errors: reads degrade to a miss and writes
/// report `Ok(false)`.
pub trait Storage: Send + Sync + fmt::Debug {
    /// Short backend name used in logs and stats.
    fn name(&self) -> &'static str;

    /// Returns the live value for `key`, or `None` on a miss.
    fn fetch(&self, key: &str) -> Result<Option<Value>>;

    /// Stores `value` for `ttl` (backend default when `None`).
    fn set(&self, key: &str, value: &Value, ttl: Option<Ttl>) -> Result<bool>;

    /// Removes `key`.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Removes every entry this backend can see.
    fn clear(&self) -> bool;

    /// Returns the value for `key`, or `default` on a miss.
    fn get(&self, key: &str, default: Value) -> Result<Value> {
        Ok(self.fetch(key)?.unwrap_or(default))
    }

    /// Advisory existence check.
    ///
    /// The answer may be stale by the time the caller acts on it; never use it
    /// to guard a subsequent `get` or `set`.
    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.fetch(key)?.is_some())
    }

    /// Physically removes expired entries, returning how many were dropped.
    fn prune_expired(&self) -> usize {
        0
    }
}

/// Builds the backend selected by `config.driver`.
pub fn from_config(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.driver {
        Driver::Null => Arc::new(NullStorage),
        Driver::File => Arc::new(FileStorage::local(config)?),
        Driver::Shared => Arc::new(SharedMemoryStorage::from_config(config)?),
    };
    tracing::info!(driver = %config.driver, "cache storage ready");
    Ok(storage)
}
