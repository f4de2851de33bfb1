//! Periodic garbage collection of expired revocation entries.

use super::RevocationRegistry;
use crate::clock::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Sweeps `registry` every `interval` on the tokio runtime.
/// Abort the returned handle to stop it.
pub fn spawn_sweeper(
    registry: Arc<RevocationRegistry>,
    clock: Arc<dyn Clock>,
    interval: Duration,
) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs_f64(), "revocation sweeper started");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = registry.sweep(clock.timestamp());
            if removed > 0 {
                debug!(removed, remaining = registry.len(), "revocation entries swept");
            }
        }
    })
}
