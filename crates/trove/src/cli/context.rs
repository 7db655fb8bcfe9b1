//! Config and credential resolution shared by commands

use crate::cli::error::HelpfulError;
use std::path::PathBuf;
use trove::config::{default_config_path, default_credentials_path, database_path};
use trove::{AppConfig, Credentials, ProducerConfig};
use trove_db::{BlockingStore, DbError, TableName};

/// How a command needs the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Create the file and table if absent
    Create,
    /// Fail if the file is absent
    Existing,
    /// Read the file if present, else plan against an empty in-memory table
    PlanOnly,
}

/// Paths given on the command line, or their defaults
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config_path: PathBuf,
    pub credentials_path: PathBuf,
}

impl CliContext {
    pub fn new(config: Option<PathBuf>, credentials: Option<PathBuf>) -> Self {
        Self {
            config_path: config.unwrap_or_else(default_config_path),
            credentials_path: credentials.unwrap_or_else(default_credentials_path),
        }
    }

    pub fn app_config(&self) -> Result<AppConfig, HelpfulError> {
        AppConfig::load(&self.config_path).map_err(|e| HelpfulError::config(&e, &self.config_path))
    }

    pub fn producer(&self) -> Result<ProducerConfig, HelpfulError> {
        self.app_config()?
            .producer()
            .map_err(|e| HelpfulError::config(&e, &self.config_path))
    }

    /// Credentials; the file must exist.
    pub fn credentials(&self) -> Result<Credentials, HelpfulError> {
        Credentials::load(&self.credentials_path).map_err(|e| HelpfulError::config(&e, &self.credentials_path))
    }

    /// Credentials, or empty ones when the file is absent.
    pub fn credentials_or_default(&self) -> Result<Credentials, HelpfulError> {
        if self.credentials_path.exists() {
            self.credentials()
        } else {
            tracing::debug!(path = %self.credentials_path.display(), "No credentials file");
            Ok(Credentials::default())
        }
    }

    pub fn credentials_error(&self, err: trove::ConfigError) -> HelpfulError {
        HelpfulError::config(&err, &self.credentials_path)
    }

    /// Open the producer's inventory table.
    pub fn open_store(
        &self,
        producer: &ProducerConfig,
        credentials: &Credentials,
        mode: StoreMode,
    ) -> anyhow::Result<BlockingStore> {
        let table = TableName::parse(&producer.table).map_err(|e| {
            HelpfulError::new(e.to_string())
                .with_context(format!("producer.table in {}", self.config_path.display()))
                .with_suggestion("TRY: Use letters, digits and underscores, starting with a letter")
        })?;
        let path = database_path(producer, Some(credentials));

        let store = match mode {
            StoreMode::Create => BlockingStore::open(&path, table),
            StoreMode::Existing => BlockingStore::open_existing(&path, table),
            // Nothing recorded yet: plan against an empty table
            StoreMode::PlanOnly => match BlockingStore::open_existing(&path, table.clone()) {
                Err(DbError::NotFound(_)) => BlockingStore::open_in_memory(table),
                other => other,
            },
        };
        store.map_err(|e| match e {
            DbError::NotFound(detail) => HelpfulError::database_not_found(&path, &detail).into(),
            other => anyhow::Error::new(other).context(format!("Failed to open {}", path.display())),
        })
    }
}
