//! Reconciliation engine
//!
//! Two separate algorithms with separate identity keys:
//! - [`store_sync`]: observed files vs. the persisted table, keyed by `path`
//! - [`drift`]: local files vs. a reference snapshot, keyed by `(name, content_hash)`
//!
//! Both are pure over in-memory inputs.

pub mod drift;
pub mod store_sync;

pub use drift::{compare, DriftCounts};
pub use store_sync::{
    index_by_path, plan_sync, plan_sync_with_gaps, RecordUpdate, ScanGaps, SyncOp, SyncPlan,
};
