//! Produce command: sync the inventory table with the tree, export, upload

use crate::cli::context::{CliContext, StoreMode};
use crate::cli::error::HelpfulError;
use crate::cli::output::{format_size, print_json, print_table, short_hash};
use trove::pipeline::{run_producer, ProducerJob, ProducerReport, TracingSink};
use trove_core::SyncOp;
use trove_remote::{RemoteError, TransferGateway};

#[derive(Debug)]
pub struct ProduceArgs {
    pub dry_run: bool,
    pub strict: bool,
    pub json: bool,
}

pub fn run(ctx: &CliContext, args: ProduceArgs) -> anyhow::Result<()> {
    let producer = ctx.producer()?;
    let credentials = ctx.credentials_or_default()?;

    let transfer = if args.dry_run || producer.remote_destinations.is_empty() {
        None
    } else {
        Some(
            credentials
                .transfer()
                .map_err(|e| ctx.credentials_error(e))?
                .clone(),
        )
    };

    let mode = if args.dry_run { StoreMode::PlanOnly } else { StoreMode::Create };
    let mut store = ctx.open_store(&producer, &credentials, mode)?;
    let job = ProducerJob {
        root: producer.root_dir.clone(),
        scan: producer.scan.clone(),
        export_file: producer.export_file.clone(),
        destinations: producer.remote_destinations.clone(),
        dry_run: args.dry_run,
    };

    let connect = || -> trove_remote::Result<Box<dyn TransferGateway>> {
        match &transfer {
            Some(settings) => settings.connect(),
            None => Err(RemoteError::Connect {
                destination: "transfer".to_string(),
                message: "no [transfer] section in credentials".to_string(),
            }),
        }
    };

    let result = run_producer(&job, &mut store, connect, &TracingSink);
    store.close();
    let report = result.map_err(|e| HelpfulError::pipeline(&e))?;

    if args.json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    let failures = report.item_failures();
    if args.strict && failures > 0 {
        return Err(HelpfulError::item_failures("produce", failures).into());
    }
    Ok(())
}

fn print_report(report: &ProducerReport) {
    let plan = &report.plan;
    println!("Scanned {} ({} files)", report.root, report.files_found);
    if !report.scan_skipped.is_empty() {
        println!("  {} entries could not be read", report.scan_skipped.len());
    }
    for failure in &report.extraction_failures {
        println!("  unreadable: {} ({})", failure.path, failure.error);
    }
    println!(
        "Plan: {} insert, {} update, {} delete ({} kept: not observed this run)",
        plan.inserts.len(),
        plan.updates.len(),
        plan.deletes.len(),
        plan.protected.len()
    );
    for anomaly in &plan.anomalies {
        println!("  anomaly: {}", anomaly);
    }

    if report.dry_run {
        if plan.is_empty() {
            println!("Nothing to change.");
            return;
        }
        let rows = plan
            .clone()
            .into_operations()
            .into_iter()
            .map(|op| {
                let (hash, size) = match &op {
                    SyncOp::Insert(record) => (short_hash(&record.content_hash), format_size(record.size)),
                    SyncOp::Update(update) => (
                        short_hash(&update.record.content_hash),
                        format_size(update.record.size),
                    ),
                    SyncOp::Delete { .. } => ("-".to_string(), "-".to_string()),
                };
                vec![op.label().to_string(), op.path().to_string(), hash, size]
            })
            .collect();
        print_table(&["Op", "Path", "Hash", "Size"], rows);
        println!("Dry run: nothing was written.");
        return;
    }

    if report.applied.is_clean() {
        println!("Applied {} operations", report.applied.total());
    } else {
        println!(
            "Applied {} of {} operations",
            report.applied.succeeded.len(),
            report.applied.total()
        );
    }
    for failure in &report.applied.failed {
        println!("  failed {} {}: {}", failure.item.op, failure.item.path, failure.error);
    }
    if let Some(export) = &report.export {
        println!("Exported {} records to {}", export.records, export.path);
    }
    for folder in &report.uploads.succeeded {
        println!("  uploaded to {}", folder);
    }
    for failure in &report.uploads.failed {
        println!("  upload to {} failed: {}", failure.item, failure.error);
    }
}
