//! Directory scanner
//!
//! Recursively enumerates regular files under a root. Symlinks are reported
//! neither as files nor followed into. The result is an unordered set;
//! callers must not rely on the walk order.
//!
//! A scan is all-or-nothing at the root: a missing or unreadable root fails
//! the call. Below the root, an unreadable entry is recorded in
//! [`ScanOutcome::skipped`] and the walk continues.

use crate::error::{CoreError, Result};
use serde::Serialize;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

/// Configuration for scanning operations
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Directory names pruned before descent (matched against the name only)
    pub exclude_dir_names: Vec<String>,
    /// Maximum recursion depth below the root; `None` recurses fully
    pub max_depth: Option<usize>,
}

impl ScanConfig {
    fn is_excluded(&self, name: &OsStr) -> bool {
        let name = name.to_string_lossy();
        self.exclude_dir_names.iter().any(|ex| ex.as_str() == name)
    }
}

/// Entry that could not be read during a walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSkip {
    pub path: String,
    pub message: String,
}

/// Result of a scan
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Regular files found
    pub paths: Vec<PathBuf>,
    /// Unreadable entries that were skipped
    pub skipped: Vec<ScanSkip>,
    /// Directories descended into, root included
    pub dirs_scanned: usize,
}

/// Scan `root` with [`ScanConfig::default`].
pub fn scan(root: &Path) -> Result<ScanOutcome> {
    scan_with(root, &ScanConfig::default())
}

/// Scan `root` recursively.
pub fn scan_with(root: &Path, config: &ScanConfig) -> Result<ScanOutcome> {
    let start = Instant::now();
    let metadata = fs::metadata(root).map_err(|e| CoreError::from_io(root, e))?;
    if !metadata.is_dir() {
        return Err(CoreError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    tracing::info!(root = %root.display(), "Starting scan");

    let mut walker = WalkDir::new(root).follow_links(false);
    if let Some(depth) = config.max_depth {
        walker = walker.max_depth(depth.saturating_add(1));
    }

    let mut outcome = ScanOutcome::default();
    let entries = walker.into_iter().filter_entry(|entry| {
        entry.depth() == 0 || !entry.file_type().is_dir() || !config.is_excluded(entry.file_name())
    });

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                if err.depth() == 0 {
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walk failed at root"));
                    return Err(CoreError::from_io(&path, source));
                }
                tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable entry");
                outcome.skipped.push(ScanSkip {
                    path: path.to_string_lossy().into_owned(),
                    message: err.to_string(),
                });
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            outcome.dirs_scanned += 1;
        } else if file_type.is_file() {
            outcome.paths.push(entry.into_path());
        }
    }

    tracing::info!(
        root = %root.display(),
        files = outcome.paths.len(),
        dirs = outcome.dirs_scanned,
        skipped = outcome.skipped.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Scan complete"
    );

    Ok(outcome)
}
