//! Cache Module
//!
//! Key validation, TTL resolution, the value codec and the [`Cache`] facade
//! that forwards to a storage backend.

pub mod codec;
pub(crate) mod entry;
mod facade;
mod key;
mod stats;
mod ttl;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use facade::Cache;
pub use key::validate_key;
pub use stats::{CacheStats, StatsRecorder};
pub use ttl::{resolve_ttl, resolve_ttl_at, DateInterval, Ttl};

// == Public Constants ==
/// Characters a cache key may not contain
pub const RESERVED_KEY_CHARACTERS: [char; 8] = ['{', '}', '(', ')', '/', '\\', '@', ':'];
