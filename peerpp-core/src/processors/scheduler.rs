//! Periodic maintenance: the placeholder sweep and delivery-id GC.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::coordinator::Coordinator;
use crate::registry::LockRegistry;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);
pub const PURGE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct Scheduler {
    coordinator: Arc<Coordinator>,
    registry: Arc<dyn LockRegistry>,
    delivery_retention: time::Duration,
    sweep_interval: Duration,
    purge_interval: Duration,
}

impl Scheduler {
    pub fn new(
        coordinator: Arc<Coordinator>,
        registry: Arc<dyn LockRegistry>,
        delivery_retention_days: u32,
    ) -> Self {
        Self {
            coordinator,
            registry,
            delivery_retention: time::Duration::days(i64::from(delivery_retention_days)),
            sweep_interval: SWEEP_INTERVAL,
            purge_interval: PURGE_INTERVAL,
        }
    }

    /// Both jobs run once right away, then on their interval.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut purge = tokio::time::interval(self.purge_interval);
        purge.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Scheduler started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                }

                _ = sweep.tick() => self.sweep().await,

                _ = purge.tick() => self.purge().await,
            }
        }

        info!("Scheduler shutdown complete");
    }

    async fn sweep(&self) {
        // Read on every run so a reloaded policy applies.
        let days = self.coordinator.policy().read().await.lock_expiration_days;
        match self.coordinator.sweep_expired(days).await {
            Ok(report) if !report.failures.is_empty() => {
                error!(failures = ?report.failures, "Sweep left placeholders behind");
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "Placeholder sweep failed"),
        }
    }

    async fn purge(&self) {
        let cutoff = OffsetDateTime::now_utc() - self.delivery_retention;
        match self.registry.purge_deliveries(cutoff).await {
            Ok(0) => {}
            Ok(purged) => info!(purged, "Purged old webhook delivery ids"),
            Err(e) => error!(error = %e, "Failed to purge webhook delivery ids"),
        }
    }
}
