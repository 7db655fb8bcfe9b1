//! Consumer flow: download, compare, report, deliver

use super::events::{EventSink, RunEvent};
use super::{BatchOutcome, PipelineError};
use crate::report::{render_html, write_report, ReportContext, UnverifiedFile};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use trove_core::reconcile::DriftCounts;
use trove_core::{compare, extract, scan_with, DifferenceEntry, FileRecord, InventoryDocument, ScanConfig};
use trove_remote::{Notification, Notifier, TransferGateway};

/// How the report leaves the machine
#[derive(Debug, Clone)]
pub enum DeliveryChannel {
    /// Upload the report file to each folder through the transfer gateway
    Sftp { folders: Vec<String> },
    /// Email the report as body and attachment
    Email { to: Vec<String>, subject: String },
}

impl DeliveryChannel {
    fn label(&self) -> &'static str {
        match self {
            Self::Sftp { .. } => "sftp",
            Self::Email { .. } => "email",
        }
    }
}

/// What one consumer run does
#[derive(Debug, Clone)]
pub struct ConsumerJob {
    pub local_dir: PathBuf,
    pub scan: ScanConfig,
    pub remote_folder: String,
    pub inventory_file: String,
    pub download_dir: PathBuf,
    pub report_path: PathBuf,
    pub server_name: String,
    pub delivery: DeliveryChannel,
}

/// Local file left out of the comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unverified {
    pub path: String,
    pub error: String,
}

/// Everything a consumer run did
#[derive(Debug, Clone, Serialize)]
pub struct ConsumerReport {
    pub inventory_path: String,
    pub reference_count: usize,
    pub local_count: usize,
    pub unverified: Vec<Unverified>,
    pub differences: Vec<DifferenceEntry>,
    pub extra_local: usize,
    pub missing_local: usize,
    /// Inventory entries not found locally that an unverified path may account for
    pub held_back: Vec<FileRecord>,
    pub report_path: String,
    pub channel: &'static str,
    /// Delivery targets: remote folders or email recipients
    pub deliveries: BatchOutcome<String>,
    pub duration_ms: u64,
}

impl ConsumerReport {
    pub fn item_failures(&self) -> usize {
        self.unverified.len() + self.deliveries.failed.len()
    }
}

/// Run the consumer flow.
///
/// The gateway downloads the inventory and, for [`DeliveryChannel::Sftp`],
/// uploads the report. `notifier` is only used for [`DeliveryChannel::Email`];
/// if it is `None` there, delivery is recorded as failed.
pub fn run_consumer<G>(
    job: &ConsumerJob,
    gateway: &G,
    notifier: Option<&dyn Notifier>,
    sink: &dyn EventSink,
) -> Result<ConsumerReport, PipelineError>
where
    G: TransferGateway + ?Sized,
{
    let start = Instant::now();

    // Download and parse
    let inventory_path = gateway
        .get(&job.remote_folder, &job.inventory_file, &job.download_dir)
        .map_err(PipelineError::Download)?;
    let document = InventoryDocument::read_from(&inventory_path).map_err(PipelineError::Document)?;
    let reference = document.to_file_records();
    sink.emit(RunEvent::InventoryDownloaded {
        path: inventory_path.display().to_string(),
        records: reference.len(),
    });

    // Local state
    let (local, unverified) = observe_local(&job.local_dir, &job.scan, sink)?;

    // Compare
    let (differences, held_back) =
        hold_back_unverified(compare(&local, &reference), &unverified, &job.local_dir);
    let counts = DriftCounts::of(&differences);
    sink.emit(RunEvent::DriftComputed {
        extra_local: counts.extra_local,
        missing_local: counts.missing_local,
        held_back: held_back.len(),
    });

    // Report
    let context = ReportContext {
        server_name: job.server_name.clone(),
        generated_at: now_seconds(),
        inventory: job.inventory_file.clone(),
        local_dir: job.local_dir.display().to_string(),
        reference_count: reference.len(),
        local_count: local.len(),
        unverified: unverified
            .iter()
            .map(|u| UnverifiedFile {
                path: u.path.clone(),
                reason: u.error.clone(),
            })
            .collect(),
        held_back: held_back.clone(),
    };
    let html = render_html(&context, &differences);
    write_report(&job.report_path, &html).map_err(PipelineError::Report)?;
    sink.emit(RunEvent::ReportWritten {
        path: job.report_path.display().to_string(),
    });

    // Deliver
    let deliveries = match &job.delivery {
        DeliveryChannel::Sftp { folders } => deliver_by_transfer(gateway, &job.report_path, folders, sink),
        DeliveryChannel::Email { to, subject } => {
            let notification = Notification {
                to: to.clone(),
                subject: subject.clone(),
                html_body: html,
                attachment: Some(job.report_path.clone()),
                bcc_self: true,
            };
            deliver_by_email(notifier, &notification, sink)
        }
    };

    Ok(ConsumerReport {
        inventory_path: inventory_path.display().to_string(),
        reference_count: reference.len(),
        local_count: local.len(),
        unverified,
        differences,
        extra_local: counts.extra_local,
        missing_local: counts.missing_local,
        held_back,
        report_path: job.report_path.display().to_string(),
        channel: job.delivery.label(),
        deliveries,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Scan and hash the local tree. Unreadable entries are returned, not fatal.
pub fn observe_local(
    root: &Path,
    config: &ScanConfig,
    sink: &dyn EventSink,
) -> Result<(Vec<FileRecord>, Vec<Unverified>), PipelineError> {
    let root_label = root.display().to_string();
    sink.emit(RunEvent::ScanStarted {
        root: root_label.clone(),
    });
    let outcome = scan_with(root, config).map_err(|source| PipelineError::Scan {
        root: root_label.clone(),
        source,
    })?;

    let mut unverified: Vec<Unverified> = outcome
        .skipped
        .iter()
        .map(|skip| {
            sink.emit(RunEvent::ScanSkipped {
                path: skip.path.clone(),
                message: skip.message.clone(),
            });
            Unverified {
                path: skip.path.clone(),
                error: skip.message.clone(),
            }
        })
        .collect();

    let mut local = Vec::with_capacity(outcome.paths.len());
    for path in &outcome.paths {
        match extract(path) {
            Ok(record) => local.push(record),
            Err(err) => {
                let path = path.to_string_lossy().into_owned();
                sink.emit(RunEvent::ExtractionFailed {
                    path: path.clone(),
                    error: err.to_string(),
                });
                unverified.push(Unverified {
                    path,
                    error: err.to_string(),
                });
            }
        }
    }

    sink.emit(RunEvent::ScanCompleted {
        root: root_label,
        files: outcome.paths.len(),
        skipped: outcome.skipped.len(),
    });
    Ok((local, unverified))
}

/// Pull MISSING_LOCAL entries that an unverified local path may account for
/// out of `differences`.
///
/// An entry is held back when an unverified path has the same file name, or
/// when the entry's directory contains the unverified path taken relative to
/// `local_root` (a subtree the scan could not enter).
pub fn hold_back_unverified(
    differences: Vec<DifferenceEntry>,
    unverified: &[Unverified],
    local_root: &Path,
) -> (Vec<DifferenceEntry>, Vec<FileRecord>) {
    if unverified.is_empty() {
        return (differences, Vec::new());
    }

    let covers: Vec<(Option<String>, Vec<String>)> = unverified
        .iter()
        .map(|u| {
            let path = Path::new(&u.path);
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            let relative = path.strip_prefix(local_root).unwrap_or(path);
            (name, normal_components(relative))
        })
        .collect();

    let mut kept = Vec::with_capacity(differences.len());
    let mut held_back = Vec::new();
    for entry in differences {
        match entry {
            DifferenceEntry::MissingLocal { reference } if is_covered(&reference, &covers) => {
                held_back.push(reference);
            }
            other => kept.push(other),
        }
    }
    (kept, held_back)
}

fn is_covered(reference: &FileRecord, covers: &[(Option<String>, Vec<String>)]) -> bool {
    let dirs = Path::new(&reference.path)
        .parent()
        .map(normal_components)
        .unwrap_or_default();

    covers.iter().any(|(name, relative)| {
        name.as_deref() == Some(reference.name.as_str())
            || (!relative.is_empty() && dirs.windows(relative.len()).any(|w| w == relative.as_slice()))
    })
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn now_seconds() -> NaiveDateTime {
    trove_core::extractor::truncate_to_seconds(Local::now().naive_local())
}

fn deliver_by_transfer<G>(gateway: &G, report: &Path, folders: &[String], sink: &dyn EventSink) -> BatchOutcome<String>
where
    G: TransferGateway + ?Sized,
{
    let mut deliveries = BatchOutcome::default();
    let name = report
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.html".to_string());

    for folder in folders {
        let target = trove_remote::remote_join(folder, &name);
        match gateway.put(report, folder, &name) {
            Ok(()) => {
                sink.emit(RunEvent::DeliverySucceeded {
                    channel: gateway.destination(),
                    target: target.clone(),
                });
                deliveries.succeed(target);
            }
            Err(err) => {
                sink.emit(RunEvent::DeliveryFailed {
                    channel: gateway.destination(),
                    target: target.clone(),
                    error: err.to_string(),
                });
                deliveries.fail(target, err);
            }
        }
    }
    deliveries
}

fn deliver_by_email(
    notifier: Option<&dyn Notifier>,
    notification: &Notification,
    sink: &dyn EventSink,
) -> BatchOutcome<String> {
    let mut deliveries = BatchOutcome::default();
    let target = notification.to.join(", ");

    let result = match notifier {
        Some(notifier) => notifier.send(notification).map_err(|e| e.to_string()),
        None => Err("no SMTP credentials configured".to_string()),
    };

    match result {
        Ok(delivery) => {
            if !delivery.attached {
                tracing::warn!(recipients = %target, "Report sent without attachment");
            }
            sink.emit(RunEvent::DeliverySucceeded {
                channel: "email".to_string(),
                target: target.clone(),
            });
            deliveries.succeed(target);
        }
        Err(error) => {
            sink.emit(RunEvent::DeliveryFailed {
                channel: "email".to_string(),
                target: target.clone(),
                error: error.clone(),
            });
            deliveries.fail(target, error);
        }
    }
    deliveries
}
