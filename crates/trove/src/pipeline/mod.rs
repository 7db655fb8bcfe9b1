//! Producer and consumer orchestration
//!
//! Both flows are sequential batch jobs. A failure that makes the rest of the
//! run meaningless (the scan root is gone, the store is unreachable, the
//! inventory cannot be downloaded) returns [`PipelineError`]. A failure of one
//! item inside a batch (one insert, one upload) is recorded in a
//! [`BatchOutcome`] and the batch continues.

pub mod consumer;
pub mod events;
pub mod producer;

pub use consumer::{hold_back_unverified, run_consumer, ConsumerJob, ConsumerReport, DeliveryChannel, Unverified};
pub use events::{EventSink, RecordingSink, RunEvent, TracingSink};
pub use producer::{run_producer, ExtractionFailure, ProducerJob, ProducerReport};

use serde::Serialize;
use thiserror::Error;
use trove_core::CoreError;
use trove_remote::RemoteError;

/// Run-aborting failures
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Scan of {root} failed: {source}")]
    Scan {
        root: String,
        #[source]
        source: CoreError,
    },

    #[error("Record store {operation} failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Export failed: {0}")]
    Export(#[source] CoreError),

    #[error("Inventory download failed: {0}")]
    Download(#[source] RemoteError),

    #[error("Inventory document rejected: {0}")]
    Document(#[source] CoreError),

    #[error("Report could not be written: {0}")]
    Report(#[source] std::io::Error),
}

impl PipelineError {
    pub(crate) fn store<E>(operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store {
            operation,
            source: Box::new(source),
        }
    }
}

/// One item of a batch that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure<T> {
    pub item: T,
    pub error: String,
}

/// Per-item results of a best-effort batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<ItemFailure<T>>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    pub fn succeed(&mut self, item: T) {
        self.succeeded.push(item);
    }

    pub fn fail(&mut self, item: T, error: impl ToString) {
        self.failed.push(ItemFailure {
            item,
            error: error.to_string(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}
