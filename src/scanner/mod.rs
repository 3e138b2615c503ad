//! File enumeration for batch runs.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Which files a scan picks up
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Extensions without the dot, matched case-insensitively
    pub extensions: Vec<String>,
    /// Descend into subdirectories
    pub recursive: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["flac".to_string()],
            recursive: false,
        }
    }
}

impl ScanOptions {
    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
    }
}

/// Collect the audio files under `root`, sorted by path.
///
/// A file given directly is returned as-is, whatever its extension.
/// Unreadable directory entries are logged and skipped.
pub fn collect_files(root: &Path, options: &ScanOptions) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(Error::not_found(root));
    }
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in WalkDir::new(root).max_depth(max_depth) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && options.matches(entry.path()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    tracing::debug!(root = %root.display(), count = files.len(), "Collected files");
    Ok(files)
}
