//! Reset command - delete scored data, keep uploads and archives.

use std::path::PathBuf;

use hikefly::pipeline::{self, PipelineConfig};
use hikefly::store::FsObjectStore;

use crate::error::CliError;

/// Arguments for the reset command.
pub struct ResetArgs {
    pub data_dir: PathBuf,
    pub dry_run: bool,
}

/// Run the reset command.
pub fn run(args: ResetArgs) -> Result<(), CliError> {
    tracing::info!(command = "reset", dry_run = args.dry_run, "starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::RuntimeCreation(e.to_string()))?;

    let store = FsObjectStore::new(args.data_dir.clone());
    let config = PipelineConfig::default();

    if args.dry_run {
        println!("DRY RUN - nothing will be deleted.");
        println!();
    }

    let report = runtime.block_on(pipeline::reset(&store, &config, args.dry_run))?;

    if report.deleted.is_empty() {
        println!("Nothing to delete under {}", config.scores_prefix);
    } else {
        println!("Found {} object(s) to delete:", report.deleted.len());
        for key in &report.deleted {
            let marker = if report.dry_run { "[dry-run] " } else { "" };
            println!("  {}{}", marker, key);
        }
    }

    println!();
    if report.dry_run {
        println!("Dry run complete.");
    } else {
        println!("Created empty {}leaderboard.json", config.scores_prefix);
        println!("Reset complete.");
    }

    Ok(())
}
