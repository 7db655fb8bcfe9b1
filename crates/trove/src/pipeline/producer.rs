//! Producer flow: scan, extract, sync the store, export, upload

use super::events::{EventSink, RunEvent};
use super::{BatchOutcome, PipelineError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use trove_core::reconcile::RecordUpdate;
use trove_core::{
    export, extract, plan_sync_with_gaps, scan_with, FileRecord, RecordStore, ScanConfig, ScanGaps, ScanSkip,
    SyncOp, SyncPlan,
};
use trove_remote::TransferGateway;

/// What one producer run does
#[derive(Debug, Clone)]
pub struct ProducerJob {
    pub root: PathBuf,
    pub scan: ScanConfig,
    pub export_file: PathBuf,
    pub destinations: Vec<String>,
    /// Plan only; nothing is persisted, exported or uploaded
    pub dry_run: bool,
}

/// A scanned file whose metadata could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionFailure {
    pub path: String,
    pub error: String,
}

/// One store operation, as reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedOp {
    pub op: &'static str,
    pub path: String,
}

impl From<&SyncOp> for AppliedOp {
    fn from(op: &SyncOp) -> Self {
        Self {
            op: op.label(),
            path: op.path().to_string(),
        }
    }
}

/// Export location and size
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub path: String,
    pub records: usize,
}

/// Everything a producer run did
#[derive(Debug, Clone, Serialize)]
pub struct ProducerReport {
    pub root: String,
    pub files_found: usize,
    pub scan_skipped: Vec<ScanSkip>,
    pub extraction_failures: Vec<ExtractionFailure>,
    pub plan: SyncPlan,
    pub applied: BatchOutcome<AppliedOp>,
    pub export: Option<ExportSummary>,
    /// Destination folders
    pub uploads: BatchOutcome<String>,
    pub dry_run: bool,
    pub duration_ms: u64,
}

impl ProducerReport {
    /// Failures that did not abort the run.
    pub fn item_failures(&self) -> usize {
        self.scan_skipped.len()
            + self.extraction_failures.len()
            + self.plan.anomalies.len()
            + self.applied.failed.len()
            + self.uploads.failed.len()
    }
}

/// Run the producer flow.
///
/// `connect` is called once, and only if there is something to upload. If it
/// fails, every destination is recorded as failed with that error.
pub fn run_producer<S, G, F>(
    job: &ProducerJob,
    store: &mut S,
    connect: F,
    sink: &dyn EventSink,
) -> Result<ProducerReport, PipelineError>
where
    S: RecordStore,
    G: TransferGateway,
    F: FnOnce() -> trove_remote::Result<G>,
{
    let start = Instant::now();
    let root = job.root.display().to_string();

    // Scan
    sink.emit(RunEvent::ScanStarted { root: root.clone() });
    let outcome = scan_with(&job.root, &job.scan).map_err(|source| PipelineError::Scan {
        root: root.clone(),
        source,
    })?;
    for skip in &outcome.skipped {
        sink.emit(RunEvent::ScanSkipped {
            path: skip.path.clone(),
            message: skip.message.clone(),
        });
    }
    sink.emit(RunEvent::ScanCompleted {
        root: root.clone(),
        files: outcome.paths.len(),
        skipped: outcome.skipped.len(),
    });

    // Extract
    let (observed, extraction_failures) = extract_all(&outcome.paths, sink);
    let gaps = ScanGaps {
        files: extraction_failures.iter().map(|f| f.path.clone()).collect(),
        dirs: outcome.skipped.iter().map(|s| s.path.clone()).collect(),
    };

    // Plan
    let stored = store
        .load_by_path()
        .map_err(|e| PipelineError::store("load", e))?;
    let plan = plan_sync_with_gaps(&observed, &stored, &gaps);
    for anomaly in &plan.anomalies {
        sink.emit(RunEvent::Anomaly {
            message: anomaly.to_string(),
        });
    }
    sink.emit(RunEvent::PlanReady {
        inserts: plan.inserts.len(),
        updates: plan.updates.len(),
        deletes: plan.deletes.len(),
        protected: plan.protected.len(),
    });

    let mut report = ProducerReport {
        root,
        files_found: outcome.paths.len(),
        scan_skipped: outcome.skipped,
        extraction_failures,
        plan,
        applied: BatchOutcome::default(),
        export: None,
        uploads: BatchOutcome::default(),
        dry_run: job.dry_run,
        duration_ms: 0,
    };

    if job.dry_run {
        report.duration_ms = start.elapsed().as_millis() as u64;
        return Ok(report);
    }

    // Persist
    for op in report.plan.clone().into_operations() {
        let summary = AppliedOp::from(&op);
        match apply(store, &op) {
            Ok(()) => {
                sink.emit(RunEvent::OperationApplied {
                    op: summary.op,
                    path: summary.path.clone(),
                });
                report.applied.succeed(summary);
            }
            Err(error) => {
                sink.emit(RunEvent::OperationFailed {
                    op: summary.op,
                    path: summary.path.clone(),
                    error: error.clone(),
                });
                report.applied.fail(summary, error);
            }
        }
    }

    // Export
    let records = store
        .list_all()
        .map_err(|e| PipelineError::store("list", e))?;
    let document = export(&records);
    document
        .write_to(&job.export_file)
        .map_err(PipelineError::Export)?;
    let export_path = job.export_file.display().to_string();
    sink.emit(RunEvent::Exported {
        path: export_path.clone(),
        records: document.len(),
    });
    report.export = Some(ExportSummary {
        path: export_path,
        records: document.len(),
    });

    // Upload
    report.uploads = upload(&job.export_file, &job.destinations, connect, sink);

    report.duration_ms = start.elapsed().as_millis() as u64;
    Ok(report)
}

fn extract_all(paths: &[PathBuf], sink: &dyn EventSink) -> (Vec<FileRecord>, Vec<ExtractionFailure>) {
    let mut observed = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();
    for path in paths {
        match extract(path) {
            Ok(record) => observed.push(record),
            Err(err) => {
                let failure = ExtractionFailure {
                    path: path.to_string_lossy().into_owned(),
                    error: err.to_string(),
                };
                sink.emit(RunEvent::ExtractionFailed {
                    path: failure.path.clone(),
                    error: failure.error.clone(),
                });
                failures.push(failure);
            }
        }
    }
    (observed, failures)
}

fn apply<S: RecordStore>(store: &mut S, op: &SyncOp) -> Result<(), String> {
    let result = match op {
        SyncOp::Insert(record) => store.insert(record).map(|_| ()),
        SyncOp::Update(RecordUpdate { id, record }) => store.update(*id, record),
        SyncOp::Delete { path } => store.delete(path).map(|_| ()),
    };
    result.map_err(|e| e.to_string())
}

fn upload<G, F>(export_file: &Path, destinations: &[String], connect: F, sink: &dyn EventSink) -> BatchOutcome<String>
where
    G: TransferGateway,
    F: FnOnce() -> trove_remote::Result<G>,
{
    let mut uploads = BatchOutcome::default();
    if destinations.is_empty() {
        return uploads;
    }

    let remote_name = export_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "inventory.json".to_string());

    let gateway = match connect() {
        Ok(gateway) => gateway,
        Err(err) => {
            let destination = err.destination().unwrap_or("remote").to_string();
            for folder in destinations {
                sink.emit(RunEvent::UploadFailed {
                    destination: destination.clone(),
                    folder: folder.clone(),
                    error: err.to_string(),
                });
                uploads.fail(folder.clone(), &err);
            }
            return uploads;
        }
    };

    let destination = gateway.destination();
    for folder in destinations {
        match gateway.put(export_file, folder, &remote_name) {
            Ok(()) => {
                sink.emit(RunEvent::UploadSucceeded {
                    destination: destination.clone(),
                    folder: folder.clone(),
                });
                uploads.succeed(folder.clone());
            }
            Err(err) => {
                sink.emit(RunEvent::UploadFailed {
                    destination: destination.clone(),
                    folder: folder.clone(),
                    error: err.to_string(),
                });
                uploads.fail(folder.clone(), err);
            }
        }
    }
    uploads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::events::RecordingSink;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;
    use trove_core::PersistedRecord;
    use trove_remote::{LocalDirGateway, RemoteError};

    /// In-memory store; `fail_on` makes writes to that path fail.
    #[derive(Default)]
    struct MemoryStore {
        rows: Vec<PersistedRecord>,
        next_id: i64,
        fail_on: Option<String>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("store refused {0}")]
    struct Refused(String);

    impl MemoryStore {
        fn check(&self, path: &str) -> Result<(), Refused> {
            match &self.fail_on {
                Some(bad) if bad == path => Err(Refused(path.to_string())),
                _ => Ok(()),
            }
        }
    }

    impl RecordStore for MemoryStore {
        type Error = Refused;

        fn load_by_path(&mut self) -> Result<HashMap<String, PersistedRecord>, Refused> {
            Ok(trove_core::reconcile::index_by_path(self.rows.clone()))
        }

        fn insert(&mut self, record: &FileRecord) -> Result<i64, Refused> {
            self.check(&record.path)?;
            self.next_id += 1;
            self.rows.push(PersistedRecord {
                id: self.next_id,
                file: record.clone(),
            });
            Ok(self.next_id)
        }

        fn update(&mut self, id: i64, record: &FileRecord) -> Result<(), Refused> {
            self.check(&record.path)?;
            let row = self
                .rows
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| Refused(record.path.clone()))?;
            row.file = record.clone();
            Ok(())
        }

        fn delete(&mut self, path: &str) -> Result<bool, Refused> {
            self.check(path)?;
            let before = self.rows.len();
            self.rows.retain(|r| r.file.path != path);
            Ok(self.rows.len() != before)
        }

        fn list_all(&mut self) -> Result<Vec<PersistedRecord>, Refused> {
            Ok(self.rows.clone())
        }
    }

    fn job(tmp: &TempDir, destinations: &[&str]) -> ProducerJob {
        ProducerJob {
            root: tmp.path().join("data"),
            scan: ScanConfig::default(),
            export_file: tmp.path().join("out/inventory.json"),
            destinations: destinations.iter().map(|s| s.to_string()).collect(),
            dry_run: false,
        }
    }

    fn seed(tmp: &TempDir) {
        let data = tmp.path().join("data");
        fs::create_dir_all(data.join("sub")).unwrap();
        fs::write(data.join("a.txt"), "hello").unwrap();
        fs::write(data.join("sub/b.txt"), "world").unwrap();
    }

    #[test]
    fn test_first_run_inserts_exports_uploads() {
        let tmp = TempDir::new().unwrap();
        seed(&tmp);
        let share = tmp.path().join("share");
        let mut store = MemoryStore::default();
        let sink = RecordingSink::new();

        let report = run_producer(
            &job(&tmp, &["/site-a", "/site-b"]),
            &mut store,
            || Ok(LocalDirGateway::new(&share)),
            &sink,
        )
        .unwrap();

        assert_eq!(report.files_found, 2);
        assert_eq!(report.plan.inserts.len(), 2);
        assert_eq!(report.applied.succeeded.len(), 2);
        assert_eq!(report.export.as_ref().unwrap().records, 2);
        assert_eq!(report.uploads.succeeded, vec!["/site-a".to_string(), "/site-b".to_string()]);
        assert_eq!(report.item_failures(), 0);
        assert!(share.join("site-a/inventory.json").is_file());
        assert!(share.join("site-b/inventory.json").is_file());
        assert!(sink.failures().is_empty());
    }

    #[test]
    fn test_second_run_is_noop() {
        let tmp = TempDir::new().unwrap();
        seed(&tmp);
        let mut store = MemoryStore::default();
        let sink = RecordingSink::new();
        let never = || -> trove_remote::Result<LocalDirGateway> { unreachable!("no destinations") };

        run_producer(&job(&tmp, &[]), &mut store, never, &sink).unwrap();
        let second = run_producer(&job(&tmp, &[]), &mut store, never, &sink).unwrap();
        assert!(second.plan.is_empty());
        assert_eq!(second.applied.total(), 0);
        assert_eq!(second.export.unwrap().records, 2);
    }

    #[test]
    fn test_changed_and_removed_files() {
        let tmp = TempDir::new().unwrap();
        seed(&tmp);
        let mut store = MemoryStore::default();
        let sink = RecordingSink::new();
        let none = || -> trove_remote::Result<LocalDirGateway> { unreachable!() };

        run_producer(&job(&tmp, &[]), &mut store, none, &sink).unwrap();
        fs::write(tmp.path().join("data/a.txt"), "changed").unwrap();
        fs::remove_file(tmp.path().join("data/sub/b.txt")).unwrap();

        let report = run_producer(&job(&tmp, &[]), &mut store, none, &sink).unwrap();
        assert_eq!(report.plan.updates.len(), 1);
        assert_eq!(report.plan.deletes.len(), 1);
        assert_eq!(store.rows.len(), 1);
        assert_eq!(store.rows[0].file.size, 7);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        seed(&tmp);
        let mut store = MemoryStore::default();
        let sink = RecordingSink::new();
        let mut dry = job(&tmp, &["/site-a"]);
        dry.dry_run = true;

        let report = run_producer(
            &dry,
            &mut store,
            || -> trove_remote::Result<LocalDirGateway> { unreachable!() },
            &sink,
        )
        .unwrap();
        assert_eq!(report.plan.inserts.len(), 2);
        assert!(store.rows.is_empty());
        assert!(report.export.is_none());
        assert!(!dry.export_file.exists());
    }

    #[test]
    fn test_failed_insert_does_not_stop_batch() {
        let tmp = TempDir::new().unwrap();
        seed(&tmp);
        let bad = tmp.path().join("data/a.txt").to_string_lossy().into_owned();
        let mut store = MemoryStore {
            fail_on: Some(bad.clone()),
            ..Default::default()
        };
        let sink = RecordingSink::new();

        let report = run_producer(
            &job(&tmp, &[]),
            &mut store,
            || -> trove_remote::Result<LocalDirGateway> { unreachable!() },
            &sink,
        )
        .unwrap();
        assert_eq!(report.applied.succeeded.len(), 1);
        assert_eq!(report.applied.failed.len(), 1);
        assert_eq!(report.applied.failed[0].item.path, bad);
        assert_eq!(report.export.unwrap().records, 1);
        assert!(sink
            .failures()
            .iter()
            .any(|e| matches!(e, RunEvent::OperationFailed { op: "insert", .. })));
    }

    #[test]
    fn test_connect_failure_fails_every_destination() {
        let tmp = TempDir::new().unwrap();
        seed(&tmp);
        let mut store = MemoryStore::default();
        let sink = RecordingSink::new();

        let report = run_producer(
            &job(&tmp, &["/a", "/b"]),
            &mut store,
            || -> trove_remote::Result<LocalDirGateway> {
                Err(RemoteError::Connect {
                    destination: "sftp://u@host:22".into(),
                    message: "refused".into(),
                })
            },
            &sink,
        )
        .unwrap();
        assert_eq!(report.uploads.failed.len(), 2);
        assert!(report.export.is_some());
        assert_eq!(report.item_failures(), 2);
    }

    #[test]
    fn test_missing_root_aborts() {
        let tmp = TempDir::new().unwrap();
        let mut store = MemoryStore::default();
        let sink = RecordingSink::new();
        let err = run_producer(
            &job(&tmp, &[]),
            &mut store,
            || -> trove_remote::Result<LocalDirGateway> { unreachable!() },
            &sink,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Scan { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_protected_from_delete() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        seed(&tmp);
        let mut store = MemoryStore::default();
        let sink = RecordingSink::new();
        let none = || -> trove_remote::Result<LocalDirGateway> { unreachable!() };
        run_producer(&job(&tmp, &[]), &mut store, none, &sink).unwrap();

        let locked = tmp.path().join("data/a.txt");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::File::open(&locked).is_ok() {
            // running as root; permissions are not enforced
            return;
        }

        let report = run_producer(&job(&tmp, &[]), &mut store, none, &sink).unwrap();
        assert_eq!(report.extraction_failures.len(), 1);
        assert!(report.plan.deletes.is_empty());
        assert_eq!(report.plan.protected.len(), 1);
        assert_eq!(store.rows.len(), 2);
    }
}
