//! Configuration Module
//!
//! Handles loading cache configuration from environment variables and
//! exposes dotted-path lookups (`ttl`, `storages.file.prefix`, ...) over it.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CacheError;

// == Driver ==
/// Storage backend selected by the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// No-op backend, every read misses
    #[default]
    Null,
    /// One file per entry in a directory
    File,
    /// Process-wide shared table
    Shared,
}

impl FromStr for Driver {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "null" => Ok(Driver::Null),
            "file" => Ok(Driver::File),
            "shared" | "memory" => Ok(Driver::Shared),
            other => Err(CacheError::Config(format!("unknown driver [{}]", other))),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Driver::Null => "null",
            Driver::File => "file",
            Driver::Shared => "shared",
        };
        f.write_str(name)
    }
}

/// File backend settings (`storages.file.*`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    /// Directory holding the cache files
    pub path: PathBuf,
    /// File name prefix, also the `clear` selector
    pub prefix: String,
    /// File name suffix
    pub suffix: String,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            path: env::temp_dir(),
            prefix: "cache_".to_string(),
            suffix: ".cache".to_string(),
        }
    }
}

/// Shared table settings (`storages.shared.*`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedStorageConfig {
    /// Whether the shared table may be used at all
    pub enabled: bool,
}

impl Default for SharedStorageConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Per-backend settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoragesConfig {
    pub file: FileStorageConfig,
    pub shared: SharedStorageConfig,
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default TTL in seconds for entries without explicit TTL
    pub ttl: u64,
    /// Active storage backend
    pub driver: Driver,
    /// Backend specific settings
    pub storages: StoragesConfig,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL` - Default TTL in seconds (default: 300)
    /// - `CACHE_DRIVER` - `null`, `file` or `shared` (default: null)
    /// - `CACHE_FILE_PATH` - Cache directory (default: system temp dir)
    /// - `CACHE_FILE_PREFIX` - Cache file prefix (default: cache_)
    /// - `CACHE_FILE_SUFFIX` - Cache file suffix (default: .cache)
    /// - `CACHE_SHARED_ENABLED` - Enables the shared table (default: true)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            ttl: parse_var("CACHE_TTL").unwrap_or(defaults.ttl),
            driver: parse_var("CACHE_DRIVER").unwrap_or(defaults.driver),
            storages: StoragesConfig {
                file: FileStorageConfig {
                    path: env::var("CACHE_FILE_PATH")
                        .map(PathBuf::from)
                        .unwrap_or(defaults.storages.file.path),
                    prefix: env::var("CACHE_FILE_PREFIX")
                        .unwrap_or(defaults.storages.file.prefix),
                    suffix: env::var("CACHE_FILE_SUFFIX")
                        .unwrap_or(defaults.storages.file.suffix),
                },
                shared: SharedStorageConfig {
                    enabled: parse_var("CACHE_SHARED_ENABLED")
                        .unwrap_or(defaults.storages.shared.enabled),
                },
            },
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
        }
    }

    /// Returns the value at a dotted path such as `storages.file.prefix`.
    pub fn get(&self, path: &str) -> Option<Value> {
        let mut current = serde_json::to_value(self).ok()?;
        for segment in path.split('.') {
            current = match current {
                Value::Object(mut map) => map.remove(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Typed variant of [`Config::get`], falling back to `default` when the
    /// path is missing or holds a value of another type.
    pub fn get_or<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        self.get(path)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or(default)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ttl: 300,
            driver: Driver::Null,
            storages: StoragesConfig::default(),
            server_port: 3000,
            cleanup_interval: 60,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
