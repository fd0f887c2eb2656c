//! Target path construction for download jobs
//!
//! Pure, deterministic helpers: a job's final file lands at
//! `library_root / sanitize(source) / "{id}-{sanitize(filename)}"`. The id
//! prefix guarantees two jobs never collide on disk even when they request
//! the same filename. In-flight transfers carry [`PART_SUFFIX`] until
//! finalized.

use std::path::{Path, PathBuf};

use crate::types::DownloadId;

/// Suffix marking an incomplete transfer on disk
pub const PART_SUFFIX: &str = ".part";

/// Fallback filename when neither the request nor the URL yields one
const FALLBACK_FILENAME: &str = "download.bin";

/// Sanitize a name for safe use as a single path component.
///
/// Replaces filesystem-illegal characters (covering the Windows-reserved set,
/// which is a superset of the Unix one) with `_` and collapses whitespace
/// runs into a single space.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_space = false;

    for c in name.trim().chars() {
        if c.is_whitespace() {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
            continue;
        }
        prev_space = false;

        match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => out.push('_'),
            c if c.is_control() => out.push('_'),
            c => out.push(c),
        }
    }

    if out.is_empty() {
        "download".to_string()
    } else {
        out
    }
}

/// Derive a default filename from the last path segment of a URL.
///
/// Returns [`FALLBACK_FILENAME`] for unparseable URLs and for paths ending in
/// `/` (no final segment).
pub fn filename_from_url(raw_url: &str) -> String {
    let parsed = match url::Url::parse(raw_url) {
        Ok(u) => u,
        Err(_) => return FALLBACK_FILENAME.to_string(),
    };

    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// Compute the collision-free final path for a job.
///
/// `requested_name` takes precedence over the URL-derived name. The path is
/// deterministic for a given (root, source, id, name) and does not touch the
/// filesystem.
pub fn build_target_path(
    library_root: &Path,
    source: &str,
    id: DownloadId,
    requested_name: Option<&str>,
    url: &str,
) -> PathBuf {
    let filename = match requested_name {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => filename_from_url(url),
    };

    library_root
        .join(sanitize_filename(source))
        .join(format!("{}-{}", id.0, sanitize_filename(&filename)))
}

/// The temporary path a transfer writes to before finalization
pub fn part_path(target: &Path) -> PathBuf {
    let mut os = target.as_os_str().to_os_string();
    os.push(PART_SUFFIX);
    PathBuf::from(os)
}
