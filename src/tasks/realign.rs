//! Periodic Realign Task
//!
//! Background task that runs the realign hook at a fixed interval, for hosts
//! without their own synchronization points.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::invalidation::{realign, InvalidationQueue, RealignOutcome};

/// Spawns a background task that realigns every `interval_secs` seconds.
///
/// Failures are logged and the loop keeps going.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_realign_task(state.queue.clone(), 30);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_realign_task(queue: InvalidationQueue, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!(interval_secs, "Starting periodic realign task");

        loop {
            tokio::time::sleep(interval).await;

            match realign(&queue).await {
                Ok(RealignOutcome::Invalidated(report)) if report.processed + report.dropped > 0 => {
                    info!(
                        processed = report.processed,
                        dropped = report.dropped,
                        "Periodic realign flushed invalidations"
                    );
                }
                Ok(outcome) => debug!(?outcome, "Periodic realign completed"),
                Err(e) => warn!(error = %e, "Periodic realign failed"),
            }
        }
    })
}
