//! TTL Cleanup Task
//!
//! Background task that periodically removes expired entries from the
//! backend. Reads already treat expired entries as misses; this only
//! reclaims the space they occupy.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::Cache;

/// Spawns a background task that periodically prunes expired entries.
///
/// Pruning may touch the filesystem, so each pass runs on the blocking pool.
///
/// # Arguments
/// * `cache` - Shared cache facade
/// * `cleanup_interval_secs` - Interval in seconds between cleanup runs
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(Cache::new(&config)?);
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), 60);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: Arc<Cache>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let cache = cache.clone();
            match tokio::task::spawn_blocking(move || cache.prune_expired()).await {
                Ok(0) => debug!("TTL cleanup: no expired entries found"),
                Ok(removed) => info!("TTL cleanup: removed {} expired entries", removed),
                Err(err) => warn!("TTL cleanup pass failed: {}", err),
            }
        }
    })
}
