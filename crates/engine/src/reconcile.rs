//! Periodic remote polling
//!
//! The watcher only sees local writes. Remote edits (or a conflict the user
//! resolved on the remote side) are picked up by asking every engine to
//! check its file on a fixed period.

use crate::registry::EngineRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Periodic reconciliation of every registered file
pub struct PeriodicReconciler {
    registry: Arc<EngineRegistry>,

    /// Time between polls; the first poll happens one period after start
    period: Duration,
}

impl PeriodicReconciler {
    pub fn new(registry: Arc<EngineRegistry>, period: Duration) -> Self {
        Self { registry, period }
    }

    /// Run until `shutdown` turns true or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if self.period.is_zero() {
            warn!("Periodic reconciliation disabled (zero interval)");
            return;
        }

        let mut timer = interval_at(Instant::now() + self.period, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Starting periodic reconciliation (interval: {:?})", self.period);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let registry = Arc::clone(&self.registry);
                    match tokio::task::spawn_blocking(move || registry.request_reconcile_all()).await {
                        Ok(reached) => debug!("Periodic reconciliation queued {} file(s)", reached),
                        Err(e) => warn!("Periodic reconciliation failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Periodic reconciliation stopped");
    }
}
