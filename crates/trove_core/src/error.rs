//! Error types for scanning, extraction and inventory documents

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Path not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("Integrity anomaly: {0}")]
    IntegrityAnomaly(String),

    #[error("Malformed inventory document: {0}")]
    MalformedDocument(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Classify an I/O failure on `path` into the error taxonomy.
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDocument(msg.into())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_classifies_kinds() {
        let path = Path::new("/data/a.txt");

        let err = CoreError::from_io(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, CoreError::NotFound { .. }));

        let err = CoreError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, CoreError::PermissionDenied { .. }));

        let err = CoreError::from_io(path, io::Error::new(io::ErrorKind::Other, "disk on fire"));
        match err {
            CoreError::Io { path, source } => {
                assert_eq!(path, PathBuf::from("/data/a.txt"));
                assert!(source.to_string().contains("disk on fire"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_display_includes_path() {
        let err = CoreError::NotFound {
            path: PathBuf::from("/srv/images"),
        };
        assert_eq!(err.to_string(), "Path not found: /srv/images");
    }
}
