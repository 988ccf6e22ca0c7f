//! Shared Memory Backend
//!
//! Stores values in a table shared by everything in the process. The table
//! expires entries itself; the backend never looks at timestamps.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{resolve_ttl, validate_key, CacheEntry, Ttl};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::storage::Storage;

// == Shared Memory Medium ==
/// Primitives of a shared key-value table with per-entry TTL.
///
/// Each call is atomic on its own; nothing spans two calls.
pub trait SharedMemory: Send + Sync + fmt::Debug {
    /// Whether the table can be used at all.
    fn is_available(&self) -> bool;

    /// Returns the live value for `key`.
    fn fetch(&self, key: &str) -> Option<Value>;

    /// Stores `value` for `ttl` seconds, returning whether the table accepted it.
    fn store(&self, key: &str, value: Value, ttl: u64) -> bool;

    /// Removes `key`, returning whether an entry was removed.
    fn delete(&self, key: &str) -> bool;

    /// Removes every entry.
    fn clear(&self) -> bool;

    /// Whether a live entry exists for `key`.
    fn exists(&self, key: &str) -> bool;

    /// Drops expired entries, returning how many were removed.
    fn purge_expired(&self) -> usize {
        0
    }
}

type Table = Arc<RwLock<HashMap<String, CacheEntry>>>;

// == Process Table ==
/// In-process [`SharedMemory`] medium.
///
/// Handles from [`ProcessTable::global`] all see the same table; a table from
/// [`ProcessTable::isolated`] is private to its clones.
#[derive(Debug, Clone)]
pub struct ProcessTable {
    entries: Table,
    enabled: bool,
}

impl ProcessTable {
    /// Handle to the process-wide table.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<Table> = OnceLock::new();

        Self {
            entries: GLOBAL.get_or_init(Table::default).clone(),
            enabled: true,
        }
    }

    /// Fresh table not shared with [`ProcessTable::global`].
    pub fn isolated() -> Self {
        Self {
            entries: Table::default(),
            enabled: true,
        }
    }

    /// Marks the table as usable or not.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Number of physical slots, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl SharedMemory for ProcessTable {
    fn is_available(&self) -> bool {
        self.enabled
    }

    fn fetch(&self, key: &str) -> Option<Value> {
        let now = current_timestamp_ms();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired_at(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        // Expired: drop it unless a concurrent store replaced it meanwhile
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
            entries.remove(key);
        }
        None
    }

    fn store(&self, key: &str, value: Value, ttl: u64) -> bool {
        self.entries
            .write()
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        true
    }

    fn delete(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    fn clear(&self) -> bool {
        self.entries.write().clear();
        true
    }

    fn exists(&self, key: &str) -> bool {
        self.entries
            .read()
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    fn purge_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }
}

// == Shared Memory Storage ==
/// Backend over a [`SharedMemory`] medium.
///
/// `clear` purges the whole table, including keys written by other users of
/// the same medium.
#[derive(Debug)]
pub struct SharedMemoryStorage {
    medium: Arc<dyn SharedMemory>,
    default_ttl: u64,
}

impl SharedMemoryStorage {
    /// Creates a backend over `medium`, failing fast when it is unavailable.
    pub fn new(config: &Config, medium: Arc<dyn SharedMemory>) -> Result<Self> {
        if !medium.is_available() {
            return Err(CacheError::BackendUnavailable(
                "the shared memory table is not available, check that it is enabled".to_string(),
            ));
        }

        Ok(Self {
            medium,
            default_ttl: config.get_or("ttl", Config::default().ttl),
        })
    }

    /// Backend over the process-wide table, honouring `storages.shared.enabled`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let enabled = config.get_or("storages.shared.enabled", true);
        let table = ProcessTable::global().with_enabled(enabled);
        Self::new(config, Arc::new(table))
    }
}

impl Storage for SharedMemoryStorage {
    fn name(&self) -> &'static str {
        "shared"
    }

    fn fetch(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        Ok(self.medium.fetch(key))
    }

    fn set(&self, key: &str, value: &Value, ttl: Option<Ttl>) -> Result<bool> {
        validate_key(key)?;
        let ttl = resolve_ttl(ttl, self.default_ttl)?;

        let stored = self.medium.store(key, value.clone(), ttl);
        debug!(key, ttl, stored, "shared table store");
        Ok(stored)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.medium.delete(key))
    }

    fn clear(&self) -> bool {
        self.medium.clear()
    }

    fn has(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.medium.exists(key))
    }

    fn prune_expired(&self) -> usize {
        self.medium.purge_expired()
    }
}
