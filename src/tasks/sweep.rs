//! Expiry Sweep Task
//!
//! Background task that periodically purges expired items from a provider.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Spawns a task that runs `sweep` every `interval` until aborted.
///
/// # Arguments
/// * `name` - Provider name used in log lines
/// * `interval` - Pause between two sweeps
/// * `sweep` - Produces one sweep run, resolving to the number of items purged
///
/// # Returns
/// A JoinHandle the owning provider aborts on `close`.
///
/// # Example
/// ```ignore
/// let store = Arc::new(RwLock::new(MemoryStore::new(1000, EvictionPolicy::Lru)));
/// let handle = spawn_sweep_task("memory", Duration::from_secs(60), move || {
///     let store = store.clone();
///     async move { Ok(store.write().await.purge_expired(Instant::now())) }
/// });
/// // Later, on close:
/// handle.abort();
/// ```
pub fn spawn_sweep_task<F, Fut>(name: &'static str, interval: Duration, sweep: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<usize>> + Send + 'static,
{
    tokio::spawn(async move {
        info!(
            provider = name,
            "Starting expiry sweep with interval of {:?}", interval
        );

        loop {
            tokio::time::sleep(interval).await;

            match sweep().await {
                Ok(0) => debug!(provider = name, "Expiry sweep: no expired items found"),
                Ok(removed) => info!(provider = name, "Expiry sweep: removed {} expired items", removed),
                Err(e) => warn!(provider = name, "Expiry sweep failed: {}", e),
            }
        }
    })
}
