//! Configuration and credentials
//!
//! Two TOML documents: `trove.toml` (behaviour) and `credentials.toml`
//! (secrets). Sections are read lazily so `produce` never requires the
//! `[consumer]` section and vice versa. Validation is presence-only: a missing
//! key yields [`ConfigError::Missing`] naming it as `section.key`.
//!
//! ```toml
//! [producer]
//! root_dir = "/srv/images"
//! table = "imagenes"
//! export_file = "/var/lib/trove/inventory.json"
//! remote_destinations = ["/incoming/site-a", "/incoming/site-b"]
//!
//! [consumer]
//! local_dir = "/srv/mirror"
//! remote_folder = "/incoming/site-a"
//! inventory_file = "inventory.json"
//! download_dir = "/var/lib/trove/downloads"
//! report_path = "/var/lib/trove/report.html"
//! output_action = "email"
//! server_name = "mirror-01"
//!
//! [consumer.email]
//! to = ["ops@example.com"]
//! subject = "Inventory differences"
//!
//! [log]
//! max_megabytes = 5
//! copies = 5
//! ```

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use trove_core::ScanConfig;
use trove_logging::{trove_home, LogConfig, DEFAULT_COPIES, DEFAULT_MAX_MEGABYTES};
use trove_remote::{LocalDirGateway, RemoteError, SftpGateway, SftpSettings, SmtpSettings, TransferGateway};

pub const CONFIG_ENV: &str = "TROVE_CONFIG";
pub const CREDENTIALS_ENV: &str = "TROVE_CREDENTIALS";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid TOML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Missing required setting '{0}'")]
    Missing(String),
}

// ============================================================================
// trove.toml
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    producer: Option<RawProducer>,
    consumer: Option<RawConsumer>,
    log: Option<RawLog>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawProducer {
    root_dir: Option<PathBuf>,
    table: Option<String>,
    export_file: Option<PathBuf>,
    remote_destinations: Option<Vec<String>>,
    database: Option<PathBuf>,
    #[serde(default)]
    exclude_dirs: Vec<String>,
    max_depth: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConsumer {
    local_dir: Option<PathBuf>,
    remote_folder: Option<String>,
    inventory_file: Option<String>,
    download_dir: Option<PathBuf>,
    report_path: Option<PathBuf>,
    output_action: Option<OutputAction>,
    #[serde(default)]
    report_destinations: Vec<String>,
    server_name: Option<String>,
    email: Option<RawEmail>,
    #[serde(default)]
    exclude_dirs: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawEmail {
    to: Option<Vec<String>>,
    subject: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawLog {
    path: Option<PathBuf>,
    max_megabytes: Option<u64>,
    copies: Option<usize>,
}

/// Where the consumer sends its report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputAction {
    Sftp,
    Email,
}

/// Producer settings
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub root_dir: PathBuf,
    pub table: String,
    pub export_file: PathBuf,
    pub remote_destinations: Vec<String>,
    pub database: Option<PathBuf>,
    pub scan: ScanConfig,
}

/// Email delivery settings
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub to: Vec<String>,
    pub subject: String,
}

/// Consumer settings
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub local_dir: PathBuf,
    pub remote_folder: String,
    pub inventory_file: String,
    pub download_dir: PathBuf,
    pub report_path: PathBuf,
    pub output_action: OutputAction,
    pub report_destinations: Vec<String>,
    pub server_name: String,
    pub email: Option<EmailConfig>,
    pub scan: ScanConfig,
}

/// Parsed `trove.toml`
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    raw: RawConfig,
}

fn required<T>(value: Option<T>, key: &str) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::Missing(key.to_string()))
}

fn read_toml(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = read_toml(path)?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        Ok(Self {
            raw: toml::from_str(text)?,
        })
    }

    pub fn producer(&self) -> Result<ProducerConfig, ConfigError> {
        let raw = required(self.raw.producer.clone(), "producer")?;
        Ok(ProducerConfig {
            root_dir: required(raw.root_dir, "producer.root_dir")?,
            table: required(raw.table, "producer.table")?,
            export_file: required(raw.export_file, "producer.export_file")?,
            remote_destinations: required(raw.remote_destinations, "producer.remote_destinations")?,
            database: raw.database,
            scan: ScanConfig {
                exclude_dir_names: raw.exclude_dirs,
                max_depth: raw.max_depth,
            },
        })
    }

    pub fn consumer(&self) -> Result<ConsumerConfig, ConfigError> {
        let raw = required(self.raw.consumer.clone(), "consumer")?;
        let output_action = required(raw.output_action, "consumer.output_action")?;

        let email = match raw.email {
            Some(email) => Some(EmailConfig {
                to: required(email.to, "consumer.email.to")?,
                subject: required(email.subject, "consumer.email.subject")?,
            }),
            None => None,
        };
        if output_action == OutputAction::Email && email.is_none() {
            return Err(ConfigError::Missing("consumer.email".to_string()));
        }
        if output_action == OutputAction::Sftp && raw.report_destinations.is_empty() {
            return Err(ConfigError::Missing("consumer.report_destinations".to_string()));
        }

        Ok(ConsumerConfig {
            local_dir: required(raw.local_dir, "consumer.local_dir")?,
            remote_folder: required(raw.remote_folder, "consumer.remote_folder")?,
            inventory_file: required(raw.inventory_file, "consumer.inventory_file")?,
            download_dir: raw
                .download_dir
                .unwrap_or_else(|| trove_home().join("downloads")),
            report_path: required(raw.report_path, "consumer.report_path")?,
            output_action,
            report_destinations: raw.report_destinations,
            server_name: raw.server_name.unwrap_or_else(|| "trove".to_string()),
            email,
            scan: ScanConfig {
                exclude_dir_names: raw.exclude_dirs,
                max_depth: None,
            },
        })
    }

    /// Logging settings; every key is optional.
    pub fn log(&self, verbose: bool) -> LogConfig {
        let raw = self.raw.log.clone().unwrap_or_default();
        let defaults = LogConfig::default();
        LogConfig {
            path: raw.path.unwrap_or(defaults.path),
            max_bytes: raw
                .max_megabytes
                .unwrap_or(DEFAULT_MAX_MEGABYTES)
                .saturating_mul(1024 * 1024),
            copies: raw.copies.unwrap_or(DEFAULT_COPIES),
            verbose,
        }
    }
}

// ============================================================================
// credentials.toml
// ============================================================================

/// Transfer channel credentials, tagged by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransferSettings {
    Sftp(SftpSettings),
    Local { root: PathBuf },
}

impl TransferSettings {
    pub fn destination(&self) -> String {
        match self {
            Self::Sftp(settings) => settings.destination(),
            Self::Local { root } => format!("file://{}", root.display()),
        }
    }

    /// Open the gateway these settings describe.
    pub fn connect(&self) -> Result<Box<dyn TransferGateway>, RemoteError> {
        match self {
            Self::Sftp(settings) => Ok(Box::new(SftpGateway::connect(settings)?)),
            Self::Local { root } => Ok(Box::new(LocalDirGateway::new(root.clone()))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseCredentials {
    pub path: Option<PathBuf>,
}

/// Parsed `credentials.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    transfer: Option<TransferSettings>,
    smtp: Option<SmtpSettings>,
    #[serde(default)]
    database: DatabaseCredentials,
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = read_toml(path)?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn transfer(&self) -> Result<&TransferSettings, ConfigError> {
        self.transfer
            .as_ref()
            .ok_or_else(|| ConfigError::Missing("transfer".to_string()))
    }

    pub fn smtp(&self) -> Result<&SmtpSettings, ConfigError> {
        self.smtp
            .as_ref()
            .ok_or_else(|| ConfigError::Missing("smtp".to_string()))
    }

    pub fn database_path(&self) -> Option<&Path> {
        self.database.path.as_deref()
    }
}

// ============================================================================
// Paths
// ============================================================================

/// `./config/<name>` when present, else `~/.trove/<name>`.
fn default_path(name: &str) -> PathBuf {
    let local = PathBuf::from("config").join(name);
    if local.exists() {
        local
    } else {
        trove_home().join(name)
    }
}

pub fn default_config_path() -> PathBuf {
    default_path("trove.toml")
}

pub fn default_credentials_path() -> PathBuf {
    default_path("credentials.toml")
}

/// Credentials file beats `producer.database`, which beats `~/.trove/trove.sqlite3`.
pub fn database_path(producer: &ProducerConfig, credentials: Option<&Credentials>) -> PathBuf {
    credentials
        .and_then(|c| c.database_path().map(Path::to_path_buf))
        .or_else(|| producer.database.clone())
        .unwrap_or_else(|| trove_home().join("trove.sqlite3"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[producer]
root_dir = "/srv/images"
table = "imagenes"
export_file = "/tmp/out/inventory.json"
remote_destinations = ["/incoming/a", "/incoming/b"]
exclude_dirs = [".cache"]

[consumer]
local_dir = "/srv/mirror"
remote_folder = "/incoming/a"
inventory_file = "inventory.json"
download_dir = "/tmp/dl"
report_path = "/tmp/report.html"
output_action = "email"
server_name = "mirror-01"

[consumer.email]
to = ["ops@example.com"]
subject = "Differences"

[log]
max_megabytes = 2
copies = 3
"#;

    #[test]
    fn test_full_config() {
        let config = AppConfig::from_toml_str(FULL).unwrap();

        let producer = config.producer().unwrap();
        assert_eq!(producer.root_dir, PathBuf::from("/srv/images"));
        assert_eq!(producer.remote_destinations.len(), 2);
        assert_eq!(producer.scan.exclude_dir_names, vec![".cache".to_string()]);

        let consumer = config.consumer().unwrap();
        assert_eq!(consumer.output_action, OutputAction::Email);
        assert_eq!(consumer.email.unwrap().to, vec!["ops@example.com".to_string()]);

        let log = config.log(true);
        assert_eq!(log.max_bytes, 2 * 1024 * 1024);
        assert_eq!(log.copies, 3);
        assert!(log.verbose);
    }

    #[test]
    fn test_huge_log_size_saturates() {
        let config = AppConfig::from_toml_str("[log]\nmax_megabytes = 9223372036854775807\n").unwrap();
        assert_eq!(config.log(false).max_bytes, u64::MAX);
    }

    #[test]
    fn test_missing_keys_are_named() {
        let config = AppConfig::from_toml_str("[producer]\nroot_dir = \"/x\"\n").unwrap();
        let err = config.producer().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref k) if k == "producer.table"));

        let err = config.consumer().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref k) if k == "consumer"));
    }

    #[test]
    fn test_email_action_requires_email_section() {
        let text = r#"
[consumer]
local_dir = "/x"
remote_folder = "/in"
inventory_file = "inv.json"
report_path = "/tmp/r.html"
output_action = "email"
"#;
        let err = AppConfig::from_toml_str(text).unwrap().consumer().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref k) if k == "consumer.email"));
    }

    #[test]
    fn test_credentials_sftp_defaults() {
        let text = r#"
[transfer]
type = "sftp"
host = "backup.example"
username = "trove"
password = "pw"

[smtp]
sender = "reports@example.com"
server = "smtp.example.com"
password = "pw"

[database]
path = "/var/lib/trove/db.sqlite3"
"#;
        let creds: Credentials = toml::from_str(text).unwrap();
        match creds.transfer().unwrap() {
            TransferSettings::Sftp(s) => {
                assert_eq!(s.port, 22);
                assert!(s.private_key.is_none());
            }
            other => panic!("unexpected transfer settings: {other:?}"),
        }
        assert_eq!(creds.smtp().unwrap().port, 465);
        assert_eq!(creds.database_path(), Some(Path::new("/var/lib/trove/db.sqlite3")));
    }

    #[test]
    fn test_database_path_precedence() {
        let producer = AppConfig::from_toml_str(FULL).unwrap().producer().unwrap();
        let creds: Credentials = toml::from_str("[database]\npath = \"/a.db\"\n").unwrap();

        assert_eq!(database_path(&producer, Some(&creds)), PathBuf::from("/a.db"));

        let mut with_db = producer.clone();
        with_db.database = Some(PathBuf::from("/b.db"));
        assert_eq!(database_path(&with_db, Some(&Credentials::default())), PathBuf::from("/b.db"));
        assert!(database_path(&producer, None).ends_with("trove.sqlite3"));
    }

    #[test]
    fn test_local_transfer_settings() {
        let creds: Credentials = toml::from_str("[transfer]\ntype = \"local\"\nroot = \"/mnt/share\"\n").unwrap();
        let transfer = creds.transfer().unwrap();
        assert_eq!(transfer.destination(), "file:///mnt/share");
    }
}
