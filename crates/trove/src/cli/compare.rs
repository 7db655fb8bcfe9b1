//! Compare command: offline drift check against an inventory file

use crate::cli::error::HelpfulError;
use crate::cli::output::{format_size, print_json, print_table_colored, short_hash};
use chrono::Local;
use comfy_table::Color;
use serde::Serialize;
use std::path::PathBuf;
use trove::pipeline::consumer::{hold_back_unverified, observe_local};
use trove::pipeline::{TracingSink, Unverified};
use trove::report::{render_html, write_report, ReportContext, UnverifiedFile};
use trove_core::extractor::truncate_to_seconds;
use trove_core::reconcile::DriftCounts;
use trove_core::{compare, DiffKind, DifferenceEntry, FileRecord, InventoryDocument, ScanConfig};

#[derive(Debug)]
pub struct CompareArgs {
    pub inventory: PathBuf,
    pub dir: PathBuf,
    pub exclude: Vec<String>,
    /// Also write the HTML report here
    pub html: Option<PathBuf>,
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct CompareResult {
    pub inventory: PathBuf,
    pub local_dir: PathBuf,
    pub reference_count: usize,
    pub local_count: usize,
    pub extra_local: usize,
    pub missing_local: usize,
    pub differences: Vec<DifferenceEntry>,
    pub held_back: Vec<FileRecord>,
    pub unverified: Vec<Unverified>,
}

pub fn run(args: CompareArgs) -> anyhow::Result<()> {
    if !args.inventory.is_file() {
        return Err(HelpfulError::path_not_found(&args.inventory).into());
    }
    if !args.dir.is_dir() {
        return Err(HelpfulError::not_a_directory(&args.dir).into());
    }

    let document = InventoryDocument::read_from(&args.inventory).map_err(|e| {
        HelpfulError::new(e.to_string())
            .with_context(format!("Parsing {}", args.inventory.display()))
            .with_suggestion("TRY: Regenerate it with: trove export --output <file>")
    })?;
    let reference = document.to_file_records();

    let config = ScanConfig {
        exclude_dir_names: args.exclude,
        max_depth: None,
    };
    let (local, unverified) = observe_local(&args.dir, &config, &TracingSink)?;
    let (differences, held_back) =
        hold_back_unverified(compare(&local, &reference), &unverified, &args.dir);
    let counts = DriftCounts::of(&differences);

    if let Some(html_path) = &args.html {
        let context = ReportContext {
            server_name: "trove compare".to_string(),
            generated_at: truncate_to_seconds(Local::now().naive_local()),
            inventory: args.inventory.display().to_string(),
            local_dir: args.dir.display().to_string(),
            reference_count: reference.len(),
            local_count: local.len(),
            unverified: unverified
                .iter()
                .map(|u| UnverifiedFile {
                    path: u.path.clone(),
                    reason: u.error.clone(),
                })
                .collect(),
            held_back: held_back.clone(),
        };
        write_report(html_path, &render_html(&context, &differences))?;
    }

    let result = CompareResult {
        inventory: args.inventory,
        local_dir: args.dir,
        reference_count: reference.len(),
        local_count: local.len(),
        extra_local: counts.extra_local,
        missing_local: counts.missing_local,
        differences,
        held_back,
        unverified,
    };

    if args.json {
        return print_json(&result);
    }

    println!(
        "{} local files vs {} inventory records: {} extra, {} missing",
        result.local_count, result.reference_count, result.extra_local, result.missing_local
    );
    if result.differences.is_empty() && result.held_back.is_empty() {
        println!("No differences found.");
    } else {
        let rows = result
            .differences
            .iter()
            .map(|entry| {
                let record = entry.record();
                let (label, color) = match entry.kind() {
                    DiffKind::ExtraLocal => ("extra", Color::Green),
                    DiffKind::MissingLocal => ("missing", Color::Red),
                };
                vec![
                    (label.to_string(), Some(color)),
                    (record.name.clone(), None),
                    (short_hash(&record.content_hash), None),
                    (format_size(record.size), None),
                    (record.path.clone(), Some(Color::Grey)),
                ]
            })
            .collect();
        print_table_colored(&["Kind", "Name", "Hash", "Size", "Path"], rows);
    }
    for record in &result.held_back {
        println!("  not verifiable: {} ({})", record.name, record.path);
    }
    for file in &result.unverified {
        println!("  not verified: {} ({})", file.path, file.error);
    }
    Ok(())
}
