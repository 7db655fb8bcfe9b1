//! Persisted record store port
//!
//! The producer flow applies a [`SyncPlan`](crate::reconcile::SyncPlan) through
//! this trait, one call per operation, so a failing row never blocks the rest.
//! `trove_db` provides the SQLite implementation.

use crate::types::{FileRecord, PersistedRecord};
use std::collections::HashMap;

/// Access to the persisted record set, keyed by `path`
pub trait RecordStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// All stored records indexed by path.
    fn load_by_path(&mut self) -> Result<HashMap<String, PersistedRecord>, Self::Error>;

    /// Insert a new record and return its id.
    fn insert(&mut self, record: &FileRecord) -> Result<i64, Self::Error>;

    /// Overwrite every field of row `id` with `record`.
    fn update(&mut self, id: i64, record: &FileRecord) -> Result<(), Self::Error>;

    /// Delete the row for `path`. Returns false if there was none.
    fn delete(&mut self, path: &str) -> Result<bool, Self::Error>;

    /// All stored records ordered by id.
    fn list_all(&mut self) -> Result<Vec<PersistedRecord>, Self::Error>;
}
