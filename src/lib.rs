//! Simple Cache - a key-value cache facade
//!
//! One interface over interchangeable storage backends (shared in-process
//! table, filesystem, null) with TTL expiration, plus an optional HTTP front.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, DateInterval, Ttl};
pub use config::{Config, Driver};
pub use error::{CacheError, Result};
pub use storage::Storage;
pub use tasks::spawn_cleanup_task;
