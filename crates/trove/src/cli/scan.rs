//! Scan command: hash every file under a directory
//!
//! Standalone: no config, no database. Shows exactly the records the producer
//! would persist for the same tree.

use crate::cli::error::HelpfulError;
use crate::cli::output::{format_size, print_json, print_table_colored, short_hash};
use comfy_table::Color;
use serde::Serialize;
use std::path::PathBuf;
use trove::pipeline::consumer::observe_local;
use trove::pipeline::{TracingSink, Unverified};
use trove_core::types::format_timestamp;
use trove_core::{FileRecord, ScanConfig};

#[derive(Debug)]
pub struct ScanArgs {
    pub path: PathBuf,
    pub exclude: Vec<String>,
    pub depth: Option<usize>,
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct ScanResult {
    pub root: PathBuf,
    pub total_files: usize,
    pub total_size: u64,
    pub files: Vec<FileRecord>,
    pub unverified: Vec<Unverified>,
}

pub fn run(args: ScanArgs) -> anyhow::Result<()> {
    if !args.path.exists() {
        return Err(HelpfulError::path_not_found(&args.path).into());
    }
    if !args.path.is_dir() {
        return Err(HelpfulError::not_a_directory(&args.path).into());
    }

    let config = ScanConfig {
        exclude_dir_names: args.exclude,
        max_depth: args.depth,
    };
    let (mut files, unverified) = observe_local(&args.path, &config, &TracingSink)?;
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let result = ScanResult {
        root: args.path,
        total_files: files.len(),
        total_size: files.iter().map(|f| f.size).sum(),
        files,
        unverified,
    };

    if args.json {
        print_json(&result)
    } else {
        output_table(&result);
        Ok(())
    }
}

fn output_table(result: &ScanResult) {
    if result.files.is_empty() && result.unverified.is_empty() {
        println!("No files found in: {}", result.root.display());
        return;
    }

    println!(
        "Found {} files in {} ({} total)",
        result.total_files,
        result.root.display(),
        format_size(result.total_size)
    );
    println!();

    let rows = result
        .files
        .iter()
        .map(|file| {
            let display_path = PathBuf::from(&file.path)
                .strip_prefix(&result.root)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| file.path.clone());
            vec![
                (file.name.clone(), None),
                (short_hash(&file.content_hash), Some(Color::Yellow)),
                (format_size(file.size), None),
                (format_timestamp(&file.created_at), None),
                (display_path, Some(Color::Grey)),
            ]
        })
        .collect();
    print_table_colored(&["Name", "Hash", "Size", "Created", "Path"], rows);

    for file in &result.unverified {
        println!("  unreadable: {} ({})", file.path, file.error);
    }
}
