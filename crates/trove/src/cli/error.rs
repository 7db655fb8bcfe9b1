//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use std::fmt;
use std::path::Path;
use trove::pipeline::PipelineError;
use trove::ConfigError;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// Path does not exist
    pub fn path_not_found(path: &Path) -> Self {
        Self::new(format!("Path not found: {}", path.display()))
            .with_context("The specified path does not exist on the filesystem")
            .with_suggestions([
                format!("TRY: Check that the path exists: ls -la {}", path.display()),
                "TRY: Check for typos in the path".to_string(),
            ])
    }

    /// Path exists but is not a directory
    pub fn not_a_directory(path: &Path) -> Self {
        Self::new(format!("Not a directory: {}", path.display()))
            .with_context("This command expects a directory, not a file")
            .with_suggestion(format!(
                "TRY: Scan the parent directory: trove scan {}",
                path.parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| ".".to_string())
            ))
    }

    /// Config or credentials file problem
    pub fn config(err: &ConfigError, file: &Path) -> Self {
        let base = Self::new(err.to_string()).with_context(format!("Reading {}", file.display()));
        match err {
            ConfigError::Read { .. } => base.with_suggestions([
                "TRY: Create the file or point to it with --config / --credentials",
                "TRY: Set TROVE_CONFIG or TROVE_CREDENTIALS",
            ]),
            ConfigError::Parse { .. } => {
                base.with_suggestion(format!("TRY: Check the TOML syntax of {}", file.display()))
            }
            ConfigError::Missing(key) => base.with_suggestion(format!("TRY: Add '{}' to {}", key, file.display())),
        }
    }

    /// The inventory table does not exist yet
    pub fn database_not_found(path: &Path, detail: &str) -> Self {
        Self::new(format!("Inventory database not found: {}", path.display()))
            .with_context(format!("{detail}. Nothing has been recorded on this machine yet"))
            .with_suggestions([
                "TRY: Run the producer first: trove produce".to_string(),
                "TRY: Set [database] path in credentials.toml".to_string(),
            ])
    }

    /// A run aborted before finishing
    pub fn pipeline(err: &PipelineError) -> Self {
        let base = Self::new(err.to_string());
        match err {
            PipelineError::Scan { root, .. } => base
                .with_context("The directory tree could not be scanned")
                .with_suggestion(format!("TRY: Check that {} exists and is readable", root)),
            PipelineError::Store { .. } => base
                .with_context("The inventory database could not be read or written")
                .with_suggestion("TRY: Run with -v and check the log for the failing statement"),
            PipelineError::Export(_) => base
                .with_context("The inventory document could not be written")
                .with_suggestion("TRY: Check that producer.export_file is writable"),
            PipelineError::Download(_) => base
                .with_context("The inventory could not be fetched from the transfer destination")
                .with_suggestions([
                    "TRY: List the remote folder: trove remote list <folder>",
                    "TRY: Check consumer.remote_folder and consumer.inventory_file",
                ]),
            PipelineError::Document(_) => base
                .with_context("The downloaded inventory is not a valid inventory document")
                .with_suggestion("TRY: Re-run the producer to regenerate it"),
            PipelineError::Report(_) => base
                .with_context("The HTML report could not be saved")
                .with_suggestion("TRY: Check that consumer.report_path is writable"),
        }
    }

    /// `--strict` and some items failed
    pub fn item_failures(command: &str, count: usize) -> Self {
        Self::new(format!("{} finished with {} failed item(s)", command, count))
            .with_context("--strict turns per-item failures into a failed run")
            .with_suggestion("TRY: See the log for the failing paths or destinations")
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}
