//! Synchronous [`RecordStore`] over the async pool.

use crate::error::Result;
use crate::ident::TableName;
use crate::{DbError, InventoryDb};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use tokio::runtime::{Builder, Runtime};
use trove_core::{FileRecord, PersistedRecord, RecordStore};

/// Owns a current-thread runtime and drives every query to completion on it.
pub struct BlockingStore {
    runtime: Runtime,
    db: InventoryDb,
}

impl BlockingStore {
    /// Open or create the database file.
    pub fn open(path: impl AsRef<Path>, table: TableName) -> Result<Self> {
        let runtime = new_runtime()?;
        let db = runtime.block_on(InventoryDb::open(path, table))?;
        Ok(Self { runtime, db })
    }

    /// Open a database that must already exist.
    pub fn open_existing(path: impl AsRef<Path>, table: TableName) -> Result<Self> {
        let runtime = new_runtime()?;
        let db = runtime.block_on(InventoryDb::open_existing(path, table))?;
        Ok(Self { runtime, db })
    }

    pub fn open_in_memory(table: TableName) -> Result<Self> {
        let runtime = new_runtime()?;
        let db = runtime.block_on(InventoryDb::open_in_memory(table))?;
        Ok(Self { runtime, db })
    }

    pub fn db(&self) -> &InventoryDb {
        &self.db
    }

    /// Run any async database call to completion.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn close(self) {
        let Self { runtime, db } = self;
        runtime.block_on(db.close());
    }
}

fn new_runtime() -> Result<Runtime> {
    Ok(Builder::new_current_thread().enable_all().build()?)
}

impl RecordStore for BlockingStore {
    type Error = DbError;

    fn load_by_path(&mut self) -> Result<HashMap<String, PersistedRecord>> {
        self.runtime.block_on(self.db.load_by_path())
    }

    fn insert(&mut self, record: &FileRecord) -> Result<i64> {
        self.runtime.block_on(self.db.insert(record))
    }

    fn update(&mut self, id: i64, record: &FileRecord) -> Result<()> {
        self.runtime.block_on(self.db.update(id, record))
    }

    fn delete(&mut self, path: &str) -> Result<bool> {
        self.runtime.block_on(self.db.delete_by_path(path))
    }

    fn list_all(&mut self) -> Result<Vec<PersistedRecord>> {
        self.runtime.block_on(self.db.list_all())
    }
}
