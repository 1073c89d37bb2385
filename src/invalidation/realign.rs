//! Realignment hook invoked by the host at synchronization points.

use serde::Serialize;
use tracing::info;

use crate::config::RealignMode;
use crate::error::Result;
use crate::invalidation::{InvalidationQueue, InvalidationReport};

/// What a realign did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RealignOutcome {
    /// Queued invalidations were flushed
    Invalidated(InvalidationReport),
    /// The default adapter was wiped; `discarded` pending records went with it
    Cleared { discarded: usize },
}

/// Applies the configured realign mode.
pub async fn realign(queue: &InvalidationQueue) -> Result<RealignOutcome> {
    match queue.registry().config().realign_mode {
        RealignMode::Invalidate => Ok(RealignOutcome::Invalidated(queue.invalidate().await?)),
        RealignMode::Clear => {
            let discarded = queue.discard().await?;
            queue.registry().clear(None).await?;
            info!(discarded, "Realigned by clearing the default adapter");
            Ok(RealignOutcome::Cleared { discarded })
        }
    }
}
