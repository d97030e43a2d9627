//! TTL Cleanup Task
//!
//! Background task that periodically purges expired records from a
//! [`MemoryStore`].

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::backend::MemoryStore;
use crate::config::Config;

/// Spawns a background task that sweeps expired records every
/// `cleanup_interval_secs` seconds.
///
/// Reads already ignore expired records; the sweep only reclaims memory held
/// by records nobody reads again.
///
/// # Example
/// ```ignore
/// let backend = Arc::new(MemoryStore::new());
/// let cleanup_handle = spawn_cleanup_task(backend.clone(), 1);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(store: Arc<MemoryStore>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.cleanup_expired().await;

            if removed > 0 {
                info!("TTL cleanup: removed {} expired records", removed);
            } else {
                debug!("TTL cleanup: no expired records found");
            }
        }
    })
}

/// Spawns the sweep using the interval from `config`.
pub fn spawn_configured_cleanup_task(store: Arc<MemoryStore>, config: &Config) -> JoinHandle<()> {
    spawn_cleanup_task(store, config.cleanup_interval)
}
