//! Inventory record operations

use crate::error::{DbError, Result};
use crate::schema::COLUMNS;
use crate::InventoryDb;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::HashMap;
use trove_core::types::{format_timestamp, parse_timestamp};
use trove_core::{FileRecord, PersistedRecord};

impl InventoryDb {
    // ========================================================================
    // Reads
    // ========================================================================

    /// All records ordered by id.
    pub async fn list_all(&self) -> Result<Vec<PersistedRecord>> {
        let sql = format!("SELECT {} FROM {} ORDER BY id", COLUMNS, self.table.quoted());
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_record).collect()
    }

    /// All records indexed by path.
    pub async fn load_by_path(&self) -> Result<HashMap<String, PersistedRecord>> {
        let records = self.list_all().await?;
        Ok(records
            .into_iter()
            .map(|record| (record.file.path.clone(), record))
            .collect())
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) AS n FROM {}", self.table.quoted());
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        Ok(row.try_get("n")?)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert a record and return its id. Fails with `Integrity` if the path is already stored.
    pub async fn insert(&self, record: &FileRecord) -> Result<i64> {
        let sql = format!(
            "INSERT INTO {} (name, path, content_hash, size, created_at, extension, content_type) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.table.quoted()
        );
        let result = sqlx::query(&sql)
            .bind(&record.name)
            .bind(&record.path)
            .bind(&record.content_hash)
            .bind(size_to_db(record.size)?)
            .bind(format_timestamp(&record.created_at))
            .bind(&record.extension)
            .bind(&record.content_type)
            .execute(&self.pool)
            .await
            .map_err(|e| unique_violation(e, &record.path))?;

        Ok(result.last_insert_rowid())
    }

    /// Overwrite all fields of row `id`.
    pub async fn update(&self, id: i64, record: &FileRecord) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET name = ?, path = ?, content_hash = ?, size = ?, created_at = ?, \
             extension = ?, content_type = ? WHERE id = ?",
            self.table.quoted()
        );
        let result = sqlx::query(&sql)
            .bind(&record.name)
            .bind(&record.path)
            .bind(&record.content_hash)
            .bind(size_to_db(record.size)?)
            .bind(format_timestamp(&record.created_at))
            .bind(&record.extension)
            .bind(&record.content_type)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| unique_violation(e, &record.path))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("record id {}", id)));
        }
        Ok(())
    }

    /// Delete by path. Returns false if no row had that path.
    pub async fn delete_by_path(&self, path: &str) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE path = ?", self.table.quoted());
        let result = sqlx::query(&sql).bind(path).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

fn size_to_db(size: u64) -> Result<i64> {
    i64::try_from(size).map_err(|_| DbError::decode(format!("size {} exceeds storage range", size)))
}

fn unique_violation(err: sqlx::Error, path: &str) -> DbError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DbError::Integrity(format!("path already stored: {}", path))
        }
        _ => DbError::Sqlx(err),
    }
}

fn row_to_record(row: &SqliteRow) -> Result<PersistedRecord> {
    let id: i64 = row.try_get("id")?;
    let size: i64 = row.try_get("size")?;
    let created_raw: String = row.try_get("created_at")?;

    let size = u64::try_from(size)
        .map_err(|_| DbError::decode(format!("row {}: negative size {}", id, size)))?;
    let created_at = parse_timestamp(&created_raw).ok_or_else(|| {
        DbError::decode(format!("row {}: invalid created_at '{}'", id, created_raw))
    })?;

    Ok(PersistedRecord {
        id,
        file: FileRecord {
            name: row.try_get("name")?,
            path: row.try_get("path")?,
            content_hash: row.try_get("content_hash")?,
            size,
            created_at,
            extension: row.try_get("extension")?,
            content_type: row.try_get("content_type")?,
        },
    })
}
