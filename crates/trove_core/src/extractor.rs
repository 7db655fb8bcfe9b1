//! Metadata extractor
//!
//! Turns one file path into a [`FileRecord`]. Content is hashed with MD5 in
//! fixed 64 KiB blocks so memory stays bounded whatever the file size.
//!
//! ## Timestamp source
//!
//! `created_at` is platform-dependent:
//! - Unix: the inode metadata-change time (`st_ctime`). True birth time is not
//!   reliably exposed on Linux filesystems, and `st_ctime` is stable across
//!   reads and copies that preserve metadata.
//! - Elsewhere: the creation time, falling back to the modification time when
//!   the platform does not report one.
//!
//! The value is truncated to whole seconds and converted to the local clock.
//! Drift comparison does not look at it; store sync refreshes it on update but
//! never updates because of it.

use crate::error::{CoreError, Result};
use crate::types::FileRecord;
use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::Path;

/// Block size used when hashing file content
pub const HASH_BLOCK_SIZE: usize = 64 * 1024;

/// Compute the full [`FileRecord`] for `path`.
///
/// Fails with `NotFound` if the file vanished since it was scanned,
/// `PermissionDenied` if it cannot be opened, and `Io` for anything else.
/// `size` is the number of bytes that went into the hash, so the two always
/// describe the same content.
pub fn extract(path: &Path) -> Result<FileRecord> {
    let metadata = fs::metadata(path).map_err(|e| CoreError::from_io(path, e))?;
    if metadata.is_dir() {
        return Err(CoreError::Io {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "is a directory"),
        });
    }

    let (content_hash, size) = hash_file(path)?;

    let record = FileRecord {
        name: file_name(path),
        path: path.to_string_lossy().into_owned(),
        content_hash,
        size,
        created_at: created_timestamp(&metadata),
        extension: extension_of(path),
        content_type: guess_content_type(path),
    };

    tracing::debug!(path = %record.path, hash = %record.content_hash, size = record.size, "Extracted");
    Ok(record)
}

/// MD5 of a file's content plus the number of bytes read.
pub fn hash_file(path: &Path) -> Result<(String, u64)> {
    let file = File::open(path).map_err(|e| CoreError::from_io(path, e))?;
    hash_reader(file).map_err(|e| CoreError::from_io(path, e))
}

/// MD5 of everything `reader` yields, read in [`HASH_BLOCK_SIZE`] blocks.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<(String, u64)> {
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; HASH_BLOCK_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        context.consume(&buffer[..n]);
        total += n as u64;
    }

    Ok((format!("{:x}", context.compute()), total))
}

/// Lower-cased suffix including the dot; empty when there is none.
///
/// Leading-dot names such as `.bashrc` have no extension.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Best-effort MIME type from the file name.
pub fn guess_content_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first_raw().map(str::to_string)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(unix)]
fn created_timestamp(metadata: &Metadata) -> NaiveDateTime {
    use chrono::TimeZone;
    use std::os::unix::fs::MetadataExt;

    match Local.timestamp_opt(metadata.ctime(), 0).single() {
        Some(ts) => ts.naive_local(),
        None => NaiveDateTime::default(),
    }
}

#[cfg(not(unix))]
fn created_timestamp(metadata: &Metadata) -> NaiveDateTime {
    let time = metadata
        .created()
        .or_else(|_| metadata.modified())
        .unwrap_or(std::time::UNIX_EPOCH);
    local_naive(time)
}

/// Truncate to whole seconds.
pub fn truncate_to_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// `SystemTime` on the local clock, whole seconds.
pub fn local_naive(time: std::time::SystemTime) -> NaiveDateTime {
    let local: DateTime<Local> = time.into();
    truncate_to_seconds(local.naive_local())
}
