//! Run events
//!
//! The flows report progress through an [`EventSink`] handed in by the caller.
//! The CLI passes [`TracingSink`]; tests pass [`RecordingSink`] and assert on
//! what was emitted.

use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    ScanStarted { root: String },
    ScanSkipped { path: String, message: String },
    ScanCompleted { root: String, files: usize, skipped: usize },
    ExtractionFailed { path: String, error: String },
    Anomaly { message: String },
    PlanReady { inserts: usize, updates: usize, deletes: usize, protected: usize },
    OperationApplied { op: &'static str, path: String },
    OperationFailed { op: &'static str, path: String, error: String },
    Exported { path: String, records: usize },
    UploadSucceeded { destination: String, folder: String },
    UploadFailed { destination: String, folder: String, error: String },
    InventoryDownloaded { path: String, records: usize },
    DriftComputed {
        extra_local: usize,
        missing_local: usize,
        held_back: usize,
    },
    ReportWritten { path: String },
    DeliverySucceeded { channel: String, target: String },
    DeliveryFailed { channel: String, target: String, error: String },
}

impl RunEvent {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ScanSkipped { .. }
                | Self::ExtractionFailed { .. }
                | Self::Anomaly { .. }
                | Self::OperationFailed { .. }
                | Self::UploadFailed { .. }
                | Self::DeliveryFailed { .. }
        )
    }
}

/// Receives run events
pub trait EventSink {
    fn emit(&self, event: RunEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: RunEvent) {
        match &event {
            RunEvent::ScanStarted { root } => tracing::info!(root = %root, "Scan started"),
            RunEvent::ScanSkipped { path, message } => {
                tracing::warn!(path = %path, error = %message, "Skipped during scan")
            }
            RunEvent::ScanCompleted { root, files, skipped } => {
                tracing::info!(root = %root, files, skipped, "Scan completed")
            }
            RunEvent::ExtractionFailed { path, error } => {
                tracing::warn!(path = %path, error = %error, "Could not read file")
            }
            RunEvent::Anomaly { message } => tracing::error!(anomaly = %message, "Integrity anomaly"),
            RunEvent::PlanReady {
                inserts,
                updates,
                deletes,
                protected,
            } => tracing::info!(inserts, updates, deletes, protected, "Sync plan ready"),
            RunEvent::OperationApplied { op, path } => tracing::debug!(op, path = %path, "Applied"),
            RunEvent::OperationFailed { op, path, error } => {
                tracing::error!(op, path = %path, error = %error, "Store operation failed")
            }
            RunEvent::Exported { path, records } => {
                tracing::info!(path = %path, records, "Inventory exported")
            }
            RunEvent::UploadSucceeded { destination, folder } => {
                tracing::info!(destination = %destination, folder = %folder, "Inventory uploaded")
            }
            RunEvent::UploadFailed {
                destination,
                folder,
                error,
            } => tracing::error!(destination = %destination, folder = %folder, error = %error, "Upload failed"),
            RunEvent::InventoryDownloaded { path, records } => {
                tracing::info!(path = %path, records, "Inventory downloaded")
            }
            RunEvent::DriftComputed {
                extra_local,
                missing_local,
                held_back,
            } => tracing::info!(extra_local, missing_local, held_back, "Drift computed"),
            RunEvent::ReportWritten { path } => tracing::info!(path = %path, "Report written"),
            RunEvent::DeliverySucceeded { channel, target } => {
                tracing::info!(channel = %channel, target = %target, "Report delivered")
            }
            RunEvent::DeliveryFailed { channel, target, error } => {
                tracing::error!(channel = %channel, target = %target, error = %error, "Report delivery failed")
            }
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn failures(&self) -> Vec<RunEvent> {
        self.events().into_iter().filter(RunEvent::is_failure).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: RunEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
