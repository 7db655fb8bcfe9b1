//! trove core: file records, scanning and reconciliation
//!
//! - [`extractor`]: one path to one [`FileRecord`] (MD5, size, timestamp, type)
//! - [`scanner`]: recursive regular-file enumeration with skip reporting
//! - [`reconcile`]: store sync (by path) and drift comparison (by name + hash)
//! - [`export`]: the inventory document exchanged between producer and consumer
//! - [`store`]: the port the producer persists through

pub mod error;
pub mod export;
pub mod extractor;
pub mod reconcile;
pub mod scanner;
pub mod store;
pub mod types;

pub use error::{CoreError, Result};
pub use export::{export, InventoryDocument, InventoryEntry};
pub use extractor::extract;
pub use reconcile::{compare, plan_sync, plan_sync_with_gaps, ScanGaps, SyncOp, SyncPlan};
pub use scanner::{scan, scan_with, ScanConfig, ScanOutcome, ScanSkip};
pub use store::RecordStore;
pub use types::{DiffKind, DifferenceEntry, FileRecord, IntegrityAnomaly, PersistedRecord};
