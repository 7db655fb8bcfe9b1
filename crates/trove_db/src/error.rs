//! Error types for the database layer.

use thiserror::Error;

/// Database operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error (connection, query, etc.)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IO error (file system operations, runtime setup)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Table name rejected by the identifier allow-list
    #[error("Invalid table name '{0}': expected [A-Za-z_][A-Za-z0-9_]* of at most 63 characters")]
    InvalidIdentifier(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique-path violation or similar
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// Stored value that does not map back to a record
    #[error("Decode error: {0}")]
    Decode(String),
}

impl DbError {
    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
