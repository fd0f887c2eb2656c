//! # doclib-dl
//!
//! Embeddable download subsystem for document-library applications.
//!
//! ## Design Philosophy
//!
//! doclib-dl is designed to be:
//! - **Durable** - Every job lives in SQLite; a restart loses nothing
//! - **Bounded** - At most `max_parallel` transfers run at once
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use doclib_dl::{Config, DownloadManager, NewDownloadRequest, NoOpCatalog, Priority};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = DownloadManager::new(Config::default(), Arc::new(NoOpCatalog)).await?;
//!     manager.start().await?;
//!
//!     // Subscribe to events
//!     let mut events = manager.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     manager
//!         .enqueue(NewDownloadRequest {
//!             url: "https://example.com/guideline.pdf".to_string(),
//!             source: "awmf".to_string(),
//!             source_id: "021-007".to_string(),
//!             document_id: None,
//!             file_name: None,
//!             priority: Priority::Normal,
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Catalog collaborator trait
pub mod catalog;
/// Configuration types
pub mod config;
/// Database persistence layer (job store)
pub mod db;
/// Error types
pub mod error;
/// Download manager (decomposed into focused submodules)
pub mod manager;
/// Target path construction and filename sanitization
pub mod paths;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use catalog::{DocumentCatalog, NoOpCatalog};
pub use config::{Config, DownloadConfig, PathConfig, RetryConfig};
pub use db::{Database, Download, NewDownload};
pub use error::{DatabaseError, DownloadError, Error, Result};
pub use manager::DownloadManager;
pub use types::{DownloadId, Event, NewDownloadRequest, Priority, Status};

/// Helper function to run the manager with graceful signal handling.
///
/// Waits for a termination signal and then calls the manager's `stop()`
/// method, which unwinds every in-flight download before returning.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use doclib_dl::{Config, DownloadManager, NoOpCatalog, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = DownloadManager::new(Config::default(), Arc::new(NoOpCatalog)).await?;
///     manager.start().await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(manager).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(manager: DownloadManager) -> Result<()> {
    wait_for_signal().await;
    manager.stop().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
