//! Remote command: direct access to the configured transfer destination

use crate::cli::context::CliContext;
use crate::cli::error::HelpfulError;
use crate::cli::output::{format_epoch, format_size, print_json, print_table};
use clap::Subcommand;
use std::path::PathBuf;
use trove_remote::TransferGateway;

#[derive(Subcommand, Debug, Clone)]
pub enum RemoteAction {
    /// List a remote folder, newest first
    List {
        folder: String,
        #[arg(long)]
        json: bool,
    },
    /// Check whether a remote file exists (exit 1 if not)
    Exists { folder: String, name: String },
    /// Download a remote file
    Get {
        folder: String,
        name: String,
        /// Local directory to download into
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Upload a local file, creating the folder if needed
    Put {
        file: PathBuf,
        folder: String,
        /// Remote name; defaults to the local file name
        #[arg(long)]
        name: Option<String>,
    },
    /// Delete a remote file
    Delete { folder: String, name: String },
    /// Create a remote folder and its parents
    Mkdir { folder: String },
}

pub fn run(ctx: &CliContext, action: RemoteAction) -> anyhow::Result<()> {
    let credentials = ctx.credentials()?;
    let gateway = credentials
        .transfer()
        .map_err(|e| ctx.credentials_error(e))?
        .connect()?;
    let destination = gateway.destination();

    match action {
        RemoteAction::List { folder, json } => {
            let entries = gateway.list(&folder)?;
            if json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("{}{} is empty", destination, folder);
                return Ok(());
            }
            let rows = entries
                .iter()
                .map(|e| {
                    vec![
                        if e.is_dir { format!("{}/", e.name) } else { e.name.clone() },
                        e.size.map(format_size).unwrap_or_else(|| "-".to_string()),
                        e.mode.map(|m| format!("{:o}", m & 0o7777)).unwrap_or_else(|| "-".to_string()),
                        format_epoch(e.mtime),
                    ]
                })
                .collect();
            print_table(&["Name", "Size", "Mode", "Modified"], rows);
        }
        RemoteAction::Exists { folder, name } => {
            if !gateway.exists(&folder, &name)? {
                return Err(HelpfulError::new(format!(
                    "Not found: {}",
                    trove_remote::remote_join(&folder, &name)
                ))
                .with_context(format!("On {}", destination))
                .into());
            }
            println!("{}", trove_remote::remote_join(&folder, &name));
        }
        RemoteAction::Get { folder, name, dir } => {
            let local = gateway.get(&folder, &name, &dir)?;
            println!("Downloaded to {}", local.display());
        }
        RemoteAction::Put { file, folder, name } => {
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| HelpfulError::new(format!("No file name in {}", file.display())))?,
            };
            gateway.put(&file, &folder, &name)?;
            println!("Uploaded {} to {}", file.display(), trove_remote::remote_join(&folder, &name));
        }
        RemoteAction::Delete { folder, name } => {
            if gateway.delete(&folder, &name)? {
                println!("Deleted {}", trove_remote::remote_join(&folder, &name));
            } else {
                println!("Nothing to delete at {}", trove_remote::remote_join(&folder, &name));
            }
        }
        RemoteAction::Mkdir { folder } => {
            if gateway.create_folder(&folder)? {
                println!("Created {}", folder);
            } else {
                println!("{} already exists", folder);
            }
        }
    }
    Ok(())
}
