//! Logging setup for the trove binary.
//!
//! Two `fmt` layers: a plain-text file layer behind a size-rotated appender
//! and a stderr layer. File writes go through `tracing_appender::non_blocking`;
//! keep the returned [`LogGuard`] alive until exit or buffered lines are lost.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str =
    "trove=info,trove_core=info,trove_db=info,trove_remote=info,ssh2=warn,sqlx=warn";
const VERBOSE_LOG_FILTER: &str =
    "trove=debug,trove_core=debug,trove_db=debug,trove_remote=debug,ssh2=warn,sqlx=warn";

pub const DEFAULT_MAX_MEGABYTES: u64 = 5;
pub const DEFAULT_COPIES: usize = 5;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log file; rotated copies are written next to it as `<file>.1` .. `<file>.N`
    pub path: PathBuf,
    /// Rotate once the file would exceed this size
    pub max_bytes: u64,
    /// Rotated copies kept besides the live file
    pub copies: usize,
    /// Debug level on the console and in the file
    pub verbose: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            max_bytes: DEFAULT_MAX_MEGABYTES * 1024 * 1024,
            copies: DEFAULT_COPIES,
            verbose: false,
        }
    }
}

/// Flushes the background log writer on drop.
pub struct LogGuard {
    _worker: WorkerGuard,
}

/// Initialize tracing with a rotating file writer and stderr output.
pub fn init_logging(config: LogConfig) -> Result<LogGuard> {
    let appender = RotatingFileAppender::open(&config.path, config.max_bytes, config.copies)
        .with_context(|| format!("Failed to open log file {}", config.path.display()))?;
    let (file_writer, worker) = tracing_appender::non_blocking(appender);
    let file_filter = build_filter(config.verbose);
    let console_filter = file_filter.clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { _worker: worker })
}

/// `RUST_LOG` if set, otherwise the default (or verbose) filter.
fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_directives(verbose)))
}

fn fallback_directives(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    }
}

/// The trove home directory: `$TROVE_HOME`, else `~/.trove`.
pub fn trove_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("TROVE_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".trove")
}

/// `~/.trove/logs/trove.log`
pub fn default_log_path() -> PathBuf {
    trove_home().join("logs").join("trove.log")
}

/// Size-based rotation: `file` -> `file.1` -> ... -> `file.N`, oldest dropped.
pub struct RotatingFileAppender {
    path: PathBuf,
    copies: usize,
    max_size: u64,
    file: Option<File>,
    current_size: u64,
}

impl RotatingFileAppender {
    /// Open (append) the log file, creating its directory.
    pub fn open(path: &Path, max_size: u64, copies: usize) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut appender = Self {
            path: path.to_path_buf(),
            copies,
            max_size: max_size.max(1),
            file: None,
            current_size: 0,
        };
        let (file, size) = appender.open_current_file()?;
        appender.file = Some(file);
        appender.current_size = size;
        if appender.current_size > appender.max_size {
            appender.rotate()?;
        }
        Ok(appender)
    }

    fn open_current_file(&self) -> io::Result<(File, u64)> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let size = file.metadata()?.len();
        Ok((file, size))
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        if self.copies == 0 {
            fs::remove_file(&self.path).or_else(ignore_not_found)?;
        } else {
            fs::remove_file(self.rotated_path(self.copies)).or_else(ignore_not_found)?;
            for idx in (1..self.copies).rev() {
                let src = self.rotated_path(idx);
                if src.exists() {
                    fs::rename(&src, self.rotated_path(idx + 1))?;
                }
            }
            if self.path.exists() {
                fs::rename(&self.path, self.rotated_path(1))?;
            }
        }

        let (file, size) = self.open_current_file()?;
        self.file = Some(file);
        self.current_size = size;
        Ok(())
    }
}

fn ignore_not_found(err: io::Error) -> io::Result<()> {
    if err.kind() == io::ErrorKind::NotFound {
        Ok(())
    } else {
        Err(err)
    }
}

impl Write for RotatingFileAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.current_size > 0 && self.current_size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let bytes = file.write(buf)?;
        self.current_size += bytes as u64;
        Ok(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fallback_directives() {
        assert_eq!(fallback_directives(false), DEFAULT_LOG_FILTER);
        assert_eq!(fallback_directives(true), VERBOSE_LOG_FILTER);
    }

    #[test]
    fn test_rotation_keeps_copies() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs/trove.log");
        let mut appender = RotatingFileAppender::open(&path, 10, 2).unwrap();

        for line in ["aaaaaaaa\n", "bbbbbbbb\n", "cccccccc\n", "dddddddd\n"] {
            appender.write_all(line.as_bytes()).unwrap();
        }
        appender.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "dddddddd\n");
        assert_eq!(fs::read_to_string(tmp.path().join("logs/trove.log.1")).unwrap(), "cccccccc\n");
        assert_eq!(fs::read_to_string(tmp.path().join("logs/trove.log.2")).unwrap(), "bbbbbbbb\n");
        assert!(!tmp.path().join("logs/trove.log.3").exists());
    }

    #[test]
    fn test_zero_copies_truncates() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.log");
        let mut appender = RotatingFileAppender::open(&path, 4, 0).unwrap();
        appender.write_all(b"one\n").unwrap();
        appender.write_all(b"two\n").unwrap();
        appender.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "two\n");
        assert!(!tmp.path().join("t.log.1").exists());
    }

    #[test]
    fn test_reopen_appends() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.log");
        {
            let mut appender = RotatingFileAppender::open(&path, 1024, 1).unwrap();
            appender.write_all(b"first\n").unwrap();
        }
        let mut appender = RotatingFileAppender::open(&path, 1024, 1).unwrap();
        appender.write_all(b"second\n").unwrap();
        appender.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
