// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background maintenance sweeps.
//!
//! On a fixed interval the sweeper purges queue entries past the configured
//! age (closing their conversations) and re-queues conversations whose
//! assignment lease expired. Runs until the shutdown token fires. Sweep
//! failures are logged and retried on the next tick; they never take the
//! process down.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::Coordinator;

pub struct MaintenanceSweeper {
    coordinator: Arc<Coordinator>,
}

impl MaintenanceSweeper {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Spawn the sweep loop; ticks every `queue.sweep_interval_secs`.
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let interval = self.coordinator.config().queue.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Skip the immediate first tick.
            ticker.tick().await;
            info!(interval_secs = interval.as_secs(), "maintenance sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                    _ = cancel.cancelled() => {
                        info!("maintenance sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// One full sweep: queue purge, then lease recovery.
    pub async fn sweep_once(&self) {
        match self.coordinator.purge_stale_queue().await {
            Ok(closed) if !closed.is_empty() => {
                info!(count = closed.len(), "purged stale queue entries");
            }
            Ok(_) => debug!("queue purge: nothing to do"),
            Err(e) => warn!(error = %e, "queue purge failed (will retry next tick)"),
        }

        match self.coordinator.recover_expired_assignments().await {
            Ok(recovered) if !recovered.is_empty() => {
                info!(count = recovered.len(), "re-queued expired assignments");
            }
            Ok(_) => debug!("assignment recovery: nothing to do"),
            Err(e) => warn!(error = %e, "assignment recovery failed (will retry next tick)"),
        }
    }
}
