mod downloads;

use super::*;
use tempfile::NamedTempFile;

/// Open a fresh database in a temp file. The file handle keeps the path alive.
pub(crate) async fn test_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

/// A minimal insertable job for tests
pub(crate) fn sample_download(source: &str, priority: i32) -> NewDownload {
    NewDownload {
        document_id: None,
        source: source.to_string(),
        source_id: "item-1".to_string(),
        url: "https://example.com/docs/report.pdf".to_string(),
        file_name: None,
        priority,
    }
}
