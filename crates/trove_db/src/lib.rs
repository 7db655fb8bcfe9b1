//! SQLite persistence for the trove inventory table
//!
//! One table, one row per persisted record, keyed uniquely by `path`. The
//! table name is configurable and validated through [`TableName`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use trove_db::{InventoryDb, TableName};
//!
//! let table = TableName::parse("inventory")?;
//! let db = InventoryDb::open("~/.trove/trove.sqlite3", table).await?;
//! let records = db.list_all().await?;
//! ```
//!
//! The producer flow is synchronous; [`BlockingStore`] wraps the pool in a
//! current-thread runtime and implements [`trove_core::RecordStore`].

mod blocking;
mod error;
mod ident;
mod records;
mod schema;

pub use blocking::BlockingStore;
pub use error::{DbError, Result};
pub use ident::TableName;
pub use schema::{render_ddl, COLUMNS, CREATE_TABLE_TEMPLATE, TABLE_PLACEHOLDER};

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::info;

/// Inventory table access.
#[derive(Clone)]
pub struct InventoryDb {
    pool: SqlitePool,
    table: TableName,
}

impl InventoryDb {
    /// Open or create a database at the given path.
    ///
    /// Creates the inventory table if it doesn't exist.
    pub async fn open(path: impl AsRef<Path>, table: TableName) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool, table };
        db.ensure_schema().await?;

        info!(path = %path.display(), table = %db.table, records = db.count().await?, "Database opened");

        Ok(db)
    }

    /// Open an existing database (fails if not exists).
    ///
    /// Returns [`DbError::NotFound`] when the file or the inventory table is
    /// missing; the schema is never created here.
    pub async fn open_existing(path: impl AsRef<Path>, table: TableName) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DbError::not_found(format!(
                "Database not found: {}",
                path.display()
            )));
        }

        let url = format!("sqlite:{}?mode=rw", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool, table };
        if !db.table_exists().await? {
            let message = format!("Table {} not found in {}", db.table, path.display());
            db.close().await;
            return Err(DbError::not_found(message));
        }
        Ok(db)
    }

    /// Whether the inventory table has been created.
    pub async fn table_exists(&self) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(self.table.as_str())
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n > 0)
    }

    /// Private in-memory database; a single connection so every query sees it.
    pub async fn open_in_memory(table: TableName) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool, table };
        db.ensure_schema().await?;
        Ok(db)
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table() -> TableName {
        TableName::parse("inventory").unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_database() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested/test.db");

        let db = InventoryDb::open(&db_path, table()).await.unwrap();
        assert!(db_path.exists());
        assert_eq!(db.count().await.unwrap(), 0);

        db.close().await;
    }

    #[tokio::test]
    async fn test_open_existing_fails_if_not_exists() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nonexistent.db");

        let result = InventoryDb::open_existing(&db_path, table()).await;
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_open_existing_requires_the_table() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("inventory.db");

        let db = InventoryDb::open(&db_path, TableName::parse("imagenes").unwrap())
            .await
            .unwrap();
        assert!(db.table_exists().await.unwrap());
        db.close().await;

        let result = InventoryDb::open_existing(&db_path, TableName::parse("fotos").unwrap()).await;
        match result {
            Err(DbError::NotFound(message)) => assert!(message.contains("fotos"), "{message}"),
            Err(other) => panic!("expected NotFound, got {other}"),
            Ok(_) => panic!("expected NotFound, got an open database"),
        }

        let db = InventoryDb::open_existing(&db_path, TableName::parse("imagenes").unwrap())
            .await
            .unwrap();
        assert_eq!(db.count().await.unwrap(), 0);
        db.close().await;
    }
}
