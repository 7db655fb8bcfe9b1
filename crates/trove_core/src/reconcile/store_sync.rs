//! Store sync: path-keyed reconciliation
//!
//! Diffs the records observed in one scan against the persisted record set and
//! returns the operations that would bring the store up to date. Nothing here
//! touches the store; applying the plan is the caller's job.

use crate::types::{FileRecord, IntegrityAnomaly, PersistedRecord};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Replace the stored row `id` with `record`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordUpdate {
    pub id: i64,
    pub record: FileRecord,
}

/// One store operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SyncOp {
    Insert(FileRecord),
    Update(RecordUpdate),
    Delete { path: String },
}

impl SyncOp {
    /// Path the operation is about
    pub fn path(&self) -> &str {
        match self {
            Self::Insert(record) => &record.path,
            Self::Update(update) => &update.record.path,
            Self::Delete { path } => path,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Operations produced by [`plan_sync`], each list sorted by path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub inserts: Vec<FileRecord>,
    pub updates: Vec<RecordUpdate>,
    pub deletes: Vec<String>,
    /// Duplicate-path conditions found in the observed set
    pub anomalies: Vec<IntegrityAnomaly>,
    /// Stored paths kept because a scan gap covers them
    pub protected: Vec<String>,
}

impl SyncPlan {
    /// No inserts, updates or deletes.
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn operation_count(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }

    /// Flatten into operations: inserts, then updates, then deletes.
    pub fn into_operations(self) -> Vec<SyncOp> {
        let mut ops = Vec::with_capacity(self.operation_count());
        ops.extend(self.inserts.into_iter().map(SyncOp::Insert));
        ops.extend(self.updates.into_iter().map(SyncOp::Update));
        ops.extend(self.deletes.into_iter().map(|path| SyncOp::Delete { path }));
        ops
    }
}

/// Paths the current run could not observe
///
/// `files` are paths the scanner found but whose extraction failed; `dirs` are
/// directories the scanner could not read. A stored record under either was not
/// shown to be absent, so it must not be deleted.
#[derive(Debug, Clone, Default)]
pub struct ScanGaps {
    pub files: BTreeSet<String>,
    pub dirs: Vec<String>,
}

impl ScanGaps {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }

    /// Whether `path` lies in a gap.
    pub fn covers(&self, path: &str) -> bool {
        if self.files.contains(path) {
            return true;
        }
        let candidate = Path::new(path);
        self.dirs.iter().any(|dir| candidate.starts_with(Path::new(dir)))
    }
}

/// Plan a sync for a complete scan.
pub fn plan_sync(observed: &[FileRecord], stored: &HashMap<String, PersistedRecord>) -> SyncPlan {
    plan_sync_with_gaps(observed, stored, &ScanGaps::default())
}

/// Plan a sync for a scan that may have missed some paths.
///
/// - observed path not stored: insert
/// - stored with a different hash or size: update (all fields refreshed)
/// - stored, not observed, not in a gap: delete
///
/// If several observed records share a path, the last one in `observed` wins
/// and an [`IntegrityAnomaly::DuplicateObservedPath`] is recorded.
pub fn plan_sync_with_gaps(
    observed: &[FileRecord],
    stored: &HashMap<String, PersistedRecord>,
    gaps: &ScanGaps,
) -> SyncPlan {
    let mut latest: HashMap<&str, (&FileRecord, usize)> = HashMap::with_capacity(observed.len());
    for record in observed {
        latest
            .entry(record.path.as_str())
            .and_modify(|slot| {
                slot.0 = record;
                slot.1 += 1;
            })
            .or_insert((record, 1));
    }

    let mut plan = SyncPlan::default();

    for (path, (record, occurrences)) in &latest {
        if *occurrences > 1 {
            plan.anomalies.push(IntegrityAnomaly::DuplicateObservedPath {
                path: path.to_string(),
                occurrences: *occurrences,
            });
        }

        match stored.get(*path) {
            None => plan.inserts.push((*record).clone()),
            Some(existing) if existing.file.content_differs(record) => {
                plan.updates.push(RecordUpdate {
                    id: existing.id,
                    record: (*record).clone(),
                });
            }
            Some(_) => {}
        }
    }

    for path in stored.keys() {
        if latest.contains_key(path.as_str()) {
            continue;
        }
        if gaps.covers(path) {
            plan.protected.push(path.clone());
        } else {
            plan.deletes.push(path.clone());
        }
    }

    plan.inserts.sort_by(|a, b| a.path.cmp(&b.path));
    plan.updates.sort_by(|a, b| a.record.path.cmp(&b.record.path));
    plan.deletes.sort();
    plan.protected.sort();
    plan.anomalies.sort_by(|a, b| match (a, b) {
        (
            IntegrityAnomaly::DuplicateObservedPath { path: pa, .. },
            IntegrityAnomaly::DuplicateObservedPath { path: pb, .. },
        ) => pa.cmp(pb),
    });

    plan
}

/// Index persisted records by path, the store-sync key.
pub fn index_by_path(records: impl IntoIterator<Item = PersistedRecord>) -> HashMap<String, PersistedRecord> {
    records
        .into_iter()
        .map(|record| (record.file.path.clone(), record))
        .collect()
}
