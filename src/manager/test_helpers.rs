//! Shared test helpers for creating DownloadManager instances in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::tempdir;

use crate::catalog::{DocumentCatalog, NoOpCatalog};
use crate::config::Config;
use crate::manager::DownloadManager;
use crate::types::{NewDownloadRequest, Priority, Status};

/// A config rooted in a temp dir, tuned for fast tests: tiny chunks so
/// cancellation and progress are observed quickly, short request timeout.
pub(crate) fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.paths.library_dir = root.join("library");
    config.paths.database_path = root.join("data").join("doclib.db");
    config.download.max_parallel = 3;
    config.download.chunk_size = 1024;
    config.download.request_timeout = Duration::from_secs(10);
    config
}

/// Create a test DownloadManager with a no-op catalog.
/// Returns the manager and the tempdir (which must be kept alive).
pub(crate) async fn create_test_manager() -> (DownloadManager, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let manager = DownloadManager::new(config, Arc::new(NoOpCatalog))
        .await
        .unwrap();
    (manager, temp_dir)
}

/// Same as [`create_test_manager`] but with a caller-tweaked config and
/// catalog implementation.
pub(crate) async fn create_test_manager_with(
    tweak: impl FnOnce(&mut Config),
    catalog: Arc<dyn DocumentCatalog>,
) -> (DownloadManager, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    tweak(&mut config);
    let manager = DownloadManager::new(config, catalog).await.unwrap();
    (manager, temp_dir)
}

/// A request pointing at a test server path
pub(crate) fn request_for(base_url: &str, path: &str) -> NewDownloadRequest {
    NewDownloadRequest {
        url: format!("{base_url}{path}"),
        source: "testsource".to_string(),
        source_id: "item-1".to_string(),
        document_id: None,
        file_name: None,
        priority: Priority::Normal,
    }
}

/// Poll the store until the job reaches `status` or the timeout elapses
pub(crate) async fn wait_for_status(
    manager: &DownloadManager,
    id: crate::types::DownloadId,
    status: Status,
) -> crate::db::Download {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let download = manager.get(id).await.unwrap();
        if download.status() == status {
            return download;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {status}; currently {} (error: {:?})",
            download.status(),
            download.error_message
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// Catalog double that records every notification it receives
#[derive(Default)]
pub(crate) struct RecordingCatalog {
    pub(crate) downloaded: std::sync::Mutex<Vec<(i64, std::path::PathBuf, u64)>>,
    pub(crate) failed: std::sync::Mutex<Vec<(i64, String, i64)>>,
}

#[async_trait]
impl DocumentCatalog for RecordingCatalog {
    async fn mark_downloaded(
        &self,
        document_id: i64,
        path: &std::path::Path,
        size_bytes: u64,
    ) -> crate::Result<()> {
        self.downloaded
            .lock()
            .unwrap()
            .push((document_id, path.to_path_buf(), size_bytes));
        Ok(())
    }

    async fn mark_failed(
        &self,
        document_id: i64,
        error: &str,
        attempts: i64,
        _timestamp: DateTime<Utc>,
    ) -> crate::Result<()> {
        self.failed
            .lock()
            .unwrap()
            .push((document_id, error.to_string(), attempts));
        Ok(())
    }
}
