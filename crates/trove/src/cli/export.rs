//! Export command: write the inventory document from the table as it is

use crate::cli::context::{CliContext, StoreMode};
use std::path::PathBuf;
use trove_core::{export, RecordStore};

#[derive(Debug)]
pub struct ExportArgs {
    /// Defaults to `producer.export_file`
    pub output: Option<PathBuf>,
}

pub fn run(ctx: &CliContext, args: ExportArgs) -> anyhow::Result<()> {
    let producer = ctx.producer()?;
    let credentials = ctx.credentials_or_default()?;
    let mut store = ctx.open_store(&producer, &credentials, StoreMode::Existing)?;

    let records = store.list_all();
    store.close();
    let document = export(&records?);

    let output = args.output.unwrap_or(producer.export_file);
    document.write_to(&output)?;
    println!("Exported {} records to {}", document.len(), output.display());
    Ok(())
}
