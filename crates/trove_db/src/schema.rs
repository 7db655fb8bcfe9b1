//! Inventory table DDL.
//!
//! The statement is a template; the validated, quoted table name replaces
//! [`TABLE_PLACEHOLDER`]. Column order here is the column order of the
//! exported inventory document.

use crate::error::Result;
use crate::ident::TableName;
use crate::InventoryDb;
use tracing::info;

pub const TABLE_PLACEHOLDER: &str = "{table}";

pub const CREATE_TABLE_TEMPLATE: &str = r#"CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    path TEXT NOT NULL UNIQUE,
    content_hash TEXT NOT NULL,
    size INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    extension TEXT NOT NULL DEFAULT '',
    content_type TEXT
)"#;

/// Column list in declared order
pub const COLUMNS: &str = "id, name, path, content_hash, size, created_at, extension, content_type";

/// Substitute `table` into a DDL template.
pub fn render_ddl(template: &str, table: &TableName) -> String {
    template.replace(TABLE_PLACEHOLDER, &table.quoted())
}

impl InventoryDb {
    /// Ensure the inventory table exists.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;

        sqlx::query(&render_ddl(CREATE_TABLE_TEMPLATE, &self.table))
            .execute(&self.pool)
            .await?;

        info!(table = %self.table, "Database schema verified");
        Ok(())
    }
}
