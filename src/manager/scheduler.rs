//! Scheduler loop: discovers pending jobs and dispatches workers.
//!
//! Single long-lived task. Each iteration reaps finished workers, computes
//! free capacity under `max_parallel`, and dispatches the highest-priority
//! pending jobs. After dispatching it immediately re-checks for more work;
//! only an empty or full iteration sleeps, and a wakeup notification cuts
//! the sleep short.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::worker::WorkerContext;
use super::{ActiveDownload, DownloadManager};

/// Idle delay between scheduler passes when nothing is dispatchable
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Scheduler loop body. Runs until `stop` is cancelled, then drains workers.
pub(super) async fn run(manager: DownloadManager, stop: CancellationToken) {
    tracing::info!("Download scheduler started");

    loop {
        if stop.is_cancelled() {
            break;
        }

        manager.reap_finished().await;

        let dispatched = manager.dispatch_pending(&stop).await;
        if dispatched {
            // Greedy draining: look for more work before sleeping
            continue;
        }

        tokio::select! {
            _ = stop.cancelled() => break,
            _ = manager.scheduler.wakeup.notified() => {}
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }

    manager.drain_workers().await;
    tracing::info!("Download scheduler stopped");
}

impl DownloadManager {
    /// Remove completed worker entries from the active map
    async fn reap_finished(&self) {
        let mut active = self.scheduler.active.lock().await;
        active.retain(|id, entry| {
            if entry.handle.is_finished() {
                tracing::debug!(download_id = id.0, "Reaped finished worker");
                false
            } else {
                true
            }
        });
    }

    /// Dispatch pending jobs up to free capacity. Returns true if any
    /// worker was spawned this pass.
    async fn dispatch_pending(&self, stop: &CancellationToken) -> bool {
        let mut active = self.scheduler.active.lock().await;

        let capacity = self.config.download.max_parallel.saturating_sub(active.len());
        if capacity == 0 {
            return false;
        }

        let pending = match self.db.list_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                // Store errors never take the loop down; retry next pass
                tracing::error!(error = %e, "Failed to query pending downloads");
                return false;
            }
        };

        let mut dispatched = false;
        let jobs: Vec<_> = pending
            .into_iter()
            .filter(|job| !active.contains_key(&crate::types::DownloadId(job.id)))
            .take(capacity)
            .collect();
        for job in jobs {
            let id = crate::types::DownloadId(job.id);
            // Child token: a manager stop cancels every in-flight worker
            let cancel = stop.child_token();

            tracing::info!(
                download_id = id.0,
                source = %job.source,
                priority = job.priority,
                "Dispatching download"
            );

            let ctx = WorkerContext {
                id,
                db: self.db.clone(),
                config: self.config.clone(),
                catalog: self.catalog.clone(),
                http: self.http.clone(),
                event_tx: self.event_tx.clone(),
                cancel: cancel.clone(),
            };
            let handle = tokio::spawn(super::worker::run(ctx));
            active.insert(id, ActiveDownload { handle, cancel });
            dispatched = true;
        }

        dispatched
    }

    /// Cancel and await every active worker. Called once on shutdown, after
    /// the loop has exited, so no new workers can appear concurrently.
    async fn drain_workers(&self) {
        let entries: Vec<_> = {
            let mut active = self.scheduler.active.lock().await;
            active.drain().collect()
        };

        if entries.is_empty() {
            return;
        }

        tracing::info!(count = entries.len(), "Waiting for active downloads to stop");
        for (id, entry) in entries {
            entry.cancel.cancel();
            if let Err(e) = entry.handle.await {
                tracing::warn!(download_id = id.0, error = %e, "Worker task panicked during shutdown");
            }
        }
    }
}
