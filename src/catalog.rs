//! Catalog collaborator boundary
//!
//! A completed or failed download may update the document-metadata record it
//! is linked to via `document_id`. The catalog lives outside this crate; the
//! link is an identifier plus an explicit lookup performed by the
//! implementation, never an embedded object reference.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Trait for the document catalog a finished job reports to
///
/// The worker calls [`mark_downloaded`](DocumentCatalog::mark_downloaded) on
/// success and [`mark_failed`](DocumentCatalog::mark_failed) on failure, only
/// for jobs that carry a `document_id`. This crate makes no assumption about
/// the catalog entry's other fields.
///
/// Catalog errors are logged by the worker and never change the job's final
/// status — the job record is the source of truth for the download itself.
#[async_trait]
pub trait DocumentCatalog: Send + Sync {
    /// Record that the linked document's file is now on disk
    async fn mark_downloaded(
        &self,
        document_id: i64,
        path: &Path,
        size_bytes: u64,
    ) -> crate::Result<()>;

    /// Record that the latest download attempt for the linked document failed
    async fn mark_failed(
        &self,
        document_id: i64,
        error: &str,
        attempts: i64,
        timestamp: DateTime<Utc>,
    ) -> crate::Result<()>;
}

/// No-op catalog used when downloads are not linked to document records
///
/// Suitable for hosts that manage document metadata elsewhere or not at all.
/// Both notifications succeed without side effects.
pub struct NoOpCatalog;

#[async_trait]
impl DocumentCatalog for NoOpCatalog {
    async fn mark_downloaded(
        &self,
        document_id: i64,
        path: &Path,
        size_bytes: u64,
    ) -> crate::Result<()> {
        tracing::debug!(
            document_id,
            path = %path.display(),
            size_bytes,
            "No-op catalog: ignoring mark_downloaded"
        );
        Ok(())
    }

    async fn mark_failed(
        &self,
        document_id: i64,
        error: &str,
        attempts: i64,
        _timestamp: DateTime<Utc>,
    ) -> crate::Result<()> {
        tracing::debug!(
            document_id,
            error,
            attempts,
            "No-op catalog: ignoring mark_failed"
        );
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_catalog_accepts_both_notifications() {
        let catalog = NoOpCatalog;
        catalog
            .mark_downloaded(1, Path::new("/library/manual/1-file.pdf"), 1024)
            .await
            .unwrap();
        catalog
            .mark_failed(1, "connection refused", 2, Utc::now())
            .await
            .unwrap();
    }
}
