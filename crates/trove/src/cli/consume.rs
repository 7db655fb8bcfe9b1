//! Consume command: download the inventory, compare, report, deliver

use crate::cli::context::CliContext;
use crate::cli::error::HelpfulError;
use crate::cli::output::print_json;
use trove::pipeline::{run_consumer, ConsumerJob, ConsumerReport, DeliveryChannel, TracingSink};
use trove::OutputAction;
use trove_remote::{Notifier, SmtpNotifier};

#[derive(Debug)]
pub struct ConsumeArgs {
    pub strict: bool,
    pub json: bool,
}

pub fn run(ctx: &CliContext, args: ConsumeArgs) -> anyhow::Result<()> {
    let consumer = ctx
        .app_config()?
        .consumer()
        .map_err(|e| HelpfulError::config(&e, &ctx.config_path))?;
    let credentials = ctx.credentials()?;
    let transfer = credentials.transfer().map_err(|e| ctx.credentials_error(e))?;

    let delivery = match consumer.output_action {
        OutputAction::Sftp => DeliveryChannel::Sftp {
            folders: consumer.report_destinations.clone(),
        },
        OutputAction::Email => {
            let email = consumer
                .email
                .clone()
                .ok_or_else(|| HelpfulError::new("output_action = \"email\" needs [consumer.email]"))?;
            DeliveryChannel::Email {
                to: email.to,
                subject: email.subject,
            }
        }
    };

    let notifier = match (&delivery, credentials.smtp()) {
        (DeliveryChannel::Email { .. }, Ok(smtp)) => Some(SmtpNotifier::new(smtp.clone())),
        (DeliveryChannel::Email { .. }, Err(_)) => {
            tracing::warn!(path = %ctx.credentials_path.display(), "No [smtp] section; the report will not be emailed");
            None
        }
        _ => None,
    };

    let gateway = transfer.connect().map_err(|e| {
        HelpfulError::new(e.to_string())
            .with_context("Connecting to the transfer destination")
            .with_suggestion(format!(
                "TRY: Check [transfer] in {}",
                ctx.credentials_path.display()
            ))
    })?;

    let job = ConsumerJob {
        local_dir: consumer.local_dir.clone(),
        scan: consumer.scan.clone(),
        remote_folder: consumer.remote_folder.clone(),
        inventory_file: consumer.inventory_file.clone(),
        download_dir: consumer.download_dir.clone(),
        report_path: consumer.report_path.clone(),
        server_name: consumer.server_name.clone(),
        delivery,
    };

    let report = run_consumer(
        &job,
        &gateway,
        notifier.as_ref().map(|n| n as &dyn Notifier),
        &TracingSink,
    )
    .map_err(|e| HelpfulError::pipeline(&e))?;

    if args.json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    let failures = report.item_failures();
    if args.strict && failures > 0 {
        return Err(HelpfulError::item_failures("consume", failures).into());
    }
    Ok(())
}

fn print_report(report: &ConsumerReport) {
    println!(
        "Compared {} local files with {} inventory records",
        report.local_count, report.reference_count
    );
    println!("  extra locally:   {}", report.extra_local);
    println!("  missing locally: {}", report.missing_local);
    if !report.held_back.is_empty() {
        println!("  not verifiable:  {}", report.held_back.len());
    }
    if !report.unverified.is_empty() {
        println!("  not verified:    {}", report.unverified.len());
    }
    println!("Report: {}", report.report_path);
    for target in &report.deliveries.succeeded {
        println!("  sent via {} to {}", report.channel, target);
    }
    for failure in &report.deliveries.failed {
        println!("  {} delivery to {} failed: {}", report.channel, failure.item, failure.error);
    }
}
