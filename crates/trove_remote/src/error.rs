//! Remote channel errors
//!
//! Every variant names the destination it concerns so a logged failure can be
//! diagnosed without re-running.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Transfer or notification channel failure
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Cannot connect to {destination}: {message}")]
    Connect { destination: String, message: String },

    #[error("Authentication failed on {destination}: {message}")]
    Auth { destination: String, message: String },

    #[error("{operation} '{path}' on {destination} failed: {source}")]
    Operation {
        destination: String,
        operation: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Remote file not found on {destination}: {path}")]
    NotFound { destination: String, path: String },

    #[error("Local file error on {}: {source}", path.display())]
    Local {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid email address: '{0}'")]
    InvalidAddress(String),

    #[error("Sending to {destination} failed: {message}")]
    Send { destination: String, message: String },
}

impl RemoteError {
    pub fn operation(
        destination: impl Into<String>,
        operation: &'static str,
        path: impl Into<String>,
        source: io::Error,
    ) -> Self {
        Self::Operation {
            destination: destination.into(),
            operation,
            path: path.into(),
            source,
        }
    }

    pub fn local(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Local {
            path: path.into(),
            source,
        }
    }

    /// Destination the failure concerns, if it concerns one.
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Connect { destination, .. }
            | Self::Auth { destination, .. }
            | Self::Operation { destination, .. }
            | Self::NotFound { destination, .. }
            | Self::Send { destination, .. } => Some(destination),
            Self::Local { .. } | Self::InvalidAddress(_) => None,
        }
    }
}
