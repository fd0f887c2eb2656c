//! Download manager — the coordinating facade of the subsystem.
//!
//! The `DownloadManager` struct and its methods are organized by domain:
//! - [`lifecycle`] - Start/stop coordination and scheduler ownership
//! - [`scheduler`] - Scheduler loop (pending discovery, capacity, dispatch)
//! - [`worker`] - Single-job transfer execution
//! - [`control`] - External operations (enqueue/cancel/retry/get/list/wakeup)

mod control;
mod lifecycle;
mod scheduler;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::DocumentCatalog;
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::types::{DownloadId, Event};

/// One dispatched job: its task handle and the token that cancels it
pub(crate) struct ActiveDownload {
    /// Worker task handle, used for reaping and shutdown unwind
    pub(crate) handle: tokio::task::JoinHandle<()>,
    /// Per-job cancellation token (child of the scheduler's stop token)
    pub(crate) cancel: tokio_util::sync::CancellationToken,
}

/// Scheduler-owned shared state
///
/// The active map and wake notification are owned exclusively by the
/// scheduler loop; workers never touch them.
#[derive(Clone)]
pub(crate) struct SchedulerState {
    /// Active job ids mapped to their running workers (protected by Mutex)
    pub(crate) active: Arc<tokio::sync::Mutex<HashMap<DownloadId, ActiveDownload>>>,
    /// Wake notification — shortens the loop's idle-polling delay
    pub(crate) wakeup: Arc<tokio::sync::Notify>,
    /// Stop token for the currently running loop (replaced on each start)
    pub(crate) stop: Arc<std::sync::Mutex<tokio_util::sync::CancellationToken>>,
    /// Handle of the running scheduler loop, if started
    pub(crate) runner: Arc<tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

/// Main download manager instance (cloneable - all fields are Arc-wrapped)
///
/// Constructed explicitly and owned by the host process's startup/shutdown
/// sequence; there is no process-wide singleton.
#[derive(Clone)]
pub struct DownloadManager {
    /// Job store for persistence (wrapped in Arc for sharing across tasks)
    /// Public for integration tests to query download status
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (read once at manager start)
    pub(crate) config: Arc<Config>,
    /// Catalog collaborator notified about finished jobs with a document link
    pub(crate) catalog: Arc<dyn DocumentCatalog>,
    /// Shared HTTP client with the configured timeout and redirect-following
    pub(crate) http: reqwest::Client,
    /// Scheduler loop state
    pub(crate) scheduler: SchedulerState,
}

impl DownloadManager {
    /// Create a new DownloadManager instance
    ///
    /// This initializes all core components:
    /// - Creates the library directory if missing
    /// - Opens/creates the SQLite job store and runs migrations
    /// - Builds the shared streaming HTTP client
    /// - Sets up the event broadcast channel
    ///
    /// The scheduler loop is not running yet; call
    /// [`start`](DownloadManager::start) to begin dispatching.
    pub async fn new(config: Config, catalog: Arc<dyn DocumentCatalog>) -> Result<Self> {
        tokio::fs::create_dir_all(&config.paths.library_dir)
            .await
            .map_err(|e| {
                crate::Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create library directory '{}': {}",
                        config.paths.library_dir.display(),
                        e
                    ),
                ))
            })?;

        let db = Database::new(&config.paths.database_path).await?;

        let http = reqwest::Client::builder()
            .timeout(config.download.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        // Buffered so slow subscribers don't stall workers
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let scheduler = SchedulerState {
            active: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            wakeup: Arc::new(tokio::sync::Notify::new()),
            stop: Arc::new(std::sync::Mutex::new(
                tokio_util::sync::CancellationToken::new(),
            )),
            runner: Arc::new(tokio::sync::Mutex::new(None)),
        };

        Ok(Self {
            db: Arc::new(db),
            event_tx,
            config: Arc::new(config),
            catalog,
            http,
            scheduler,
        })
    }

    /// Subscribe to download events
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. A subscriber that falls behind by more than the channel
    /// buffer receives a `RecvError::Lagged` error.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// downloads proceed whether or not anyone is listening.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// The stop token of the currently running (or next) scheduler loop
    pub(crate) fn stop_token(&self) -> tokio_util::sync::CancellationToken {
        self.scheduler
            .stop
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
