//! trove: producer and consumer flows over the trove inventory
//!
//! The producer scans a directory tree, keeps a SQLite table in sync with it,
//! exports the table as an inventory document and uploads that document. The
//! consumer downloads the document, compares it with its own tree by name and
//! content hash, and delivers an HTML difference report.

pub mod config;
pub mod pipeline;
pub mod report;

pub use config::{AppConfig, ConfigError, ConsumerConfig, Credentials, OutputAction, ProducerConfig, TransferSettings};
pub use pipeline::{BatchOutcome, ItemFailure, PipelineError};
