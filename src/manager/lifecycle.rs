//! Start/stop coordination for the download manager.
//!
//! `start` spawns the scheduler loop on the runtime; `stop` signals it and
//! waits for the loop (and every worker it dispatched) to unwind before
//! returning. Both are idempotent.

use super::DownloadManager;
use crate::error::{Error, Result};
use crate::types::Event;

impl DownloadManager {
    /// Start the scheduler loop.
    ///
    /// Spawns the loop as a background task and returns immediately. Calling
    /// `start` while a loop is already running is a no-op; after a `stop` the
    /// manager can be started again with a fresh stop token.
    pub async fn start(&self) -> Result<()> {
        let mut runner = self.scheduler.runner.lock().await;
        if runner.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!("Download manager already running");
            return Ok(());
        }

        let stop = tokio_util::sync::CancellationToken::new();
        *self
            .scheduler
            .stop
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = stop.clone();

        tracing::info!(
            max_parallel = self.config.download.max_parallel,
            library_dir = %self.config.paths.library_dir.display(),
            "Starting download manager"
        );

        let manager = self.clone();
        *runner = Some(tokio::spawn(super::scheduler::run(manager, stop)));

        // Pick up jobs that were already pending before this start
        self.scheduler.wakeup.notify_one();
        Ok(())
    }

    /// Stop the scheduler loop and wait for all active downloads to unwind.
    ///
    /// Running workers observe their cancellation tokens at the next chunk
    /// boundary and persist a Cancelled status before exiting, so no job is
    /// left stuck in Downloading. Safe to call when not running.
    pub async fn stop(&self) -> Result<()> {
        let handle = self.scheduler.runner.lock().await.take();
        let Some(handle) = handle else {
            tracing::debug!("Download manager not running - nothing to stop");
            return Ok(());
        };

        tracing::info!("Stopping download manager");
        self.stop_token().cancel();
        self.scheduler.wakeup.notify_one();

        handle
            .await
            .map_err(|e| Error::Lifecycle(format!("Scheduler task failed to shut down: {e}")))?;

        self.emit_event(Event::Shutdown);
        tracing::info!("Download manager stopped");
        Ok(())
    }

    /// Whether the scheduler loop is currently running
    pub async fn is_running(&self) -> bool {
        self.scheduler
            .runner
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}
