//! trove command-line launcher
//!
//! - `produce`: scan, sync the inventory table, export and upload the inventory
//! - `consume`: download the inventory, compare with the local tree, deliver a report
//! - `scan`, `compare`, `export`, `remote`: the same pieces run by hand

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use trove::config::{CONFIG_ENV, CREDENTIALS_ENV};
use trove::AppConfig;
use trove_logging::{init_logging, LogConfig, LogGuard};

mod cli;

#[derive(Parser, Debug)]
#[command(name = "trove", version, about = "File inventory producer and consumer")]
struct Cli {
    /// Enable verbose logging (debug to stderr and the log file)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Behaviour config (default: ./config/trove.toml, else ~/.trove/trove.toml)
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Secrets (default: ./config/credentials.toml, else ~/.trove/credentials.toml)
    #[arg(long, global = true, env = CREDENTIALS_ENV)]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync the inventory table with [producer].root_dir, export it and upload it
    Produce {
        /// Print the sync plan and stop before writing anything
        #[arg(long)]
        dry_run: bool,

        /// Exit 1 if any file, row or upload failed
        #[arg(long)]
        strict: bool,

        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download the inventory, compare it with [consumer].local_dir and deliver the report
    Consume {
        /// Exit 1 if any file could not be verified or a delivery failed
        #[arg(long)]
        strict: bool,

        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Hash every file under a directory (no config or database required)
    Scan {
        /// Directory to scan
        path: PathBuf,

        /// Directory names to skip (repeatable)
        #[arg(long = "exclude")]
        exclude: Vec<String>,

        /// Maximum directory depth below the root
        #[arg(short, long)]
        depth: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare a directory with an inventory document
    Compare {
        /// Inventory document (JSON)
        #[arg(short, long)]
        inventory: PathBuf,

        /// Directory to verify
        dir: PathBuf,

        /// Directory names to skip (repeatable)
        #[arg(long = "exclude")]
        exclude: Vec<String>,

        /// Also write the HTML report to this file
        #[arg(long)]
        html: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export the inventory table without scanning
    Export {
        /// Output file (default: [producer].export_file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Operate on the configured transfer destination
    Remote {
        #[command(subcommand)]
        action: cli::remote::RemoteAction,
    },
}

fn run_command(cli: Cli) -> Result<()> {
    let ctx = cli::CliContext::new(cli.config, cli.credentials);

    match cli.command {
        Commands::Produce { dry_run, strict, json } => cli::produce::run(
            &ctx,
            cli::produce::ProduceArgs { dry_run, strict, json },
        ),
        Commands::Consume { strict, json } => cli::consume::run(&ctx, cli::consume::ConsumeArgs { strict, json }),
        Commands::Scan {
            path,
            exclude,
            depth,
            json,
        } => cli::scan::run(cli::scan::ScanArgs {
            path,
            exclude,
            depth,
            json,
        }),
        Commands::Compare {
            inventory,
            dir,
            exclude,
            html,
            json,
        } => cli::compare::run(cli::compare::CompareArgs {
            inventory,
            dir,
            exclude,
            html,
            json,
        }),
        Commands::Export { output } => cli::export::run(&ctx, cli::export::ExportArgs { output }),
        Commands::Remote { action } => cli::remote::run(&ctx, action),
    }
}

/// Logging from `[log]` when the config file is readable, defaults otherwise.
fn setup_logging(cli: &Cli) -> Option<LogGuard> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(trove::config::default_config_path);
    let log_config = match AppConfig::load(&config_path) {
        Ok(config) => config.log(cli.verbose),
        Err(_) => LogConfig {
            verbose: cli.verbose,
            ..LogConfig::default()
        },
    };

    match init_logging(log_config) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: logging to file disabled: {:#}", err);
            None
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = setup_logging(&cli);

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{:#}", err), "Command failed");
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}
