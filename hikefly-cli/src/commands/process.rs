//! Process command - run one scoring pipeline pass.

use std::path::PathBuf;
use std::sync::Arc;

use hikefly::daylight::HttpTimezoneLookup;
use hikefly::pipeline::{self, PipelineConfig};
use hikefly::store::FsObjectStore;

use crate::error::CliError;

/// Arguments for the process command.
pub struct ProcessArgs {
    pub data_dir: PathBuf,
}

/// Run the process command.
pub fn run(args: ProcessArgs) -> Result<(), CliError> {
    tracing::info!(command = "process", version = hikefly::VERSION, "starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::RuntimeCreation(e.to_string()))?;

    let store = Arc::new(FsObjectStore::new(args.data_dir.clone()));
    let lookup = Arc::new(HttpTimezoneLookup::new()?);
    let config = PipelineConfig::default();

    println!("HikeFly Pipeline v{}", hikefly::VERSION);
    println!("=================");
    println!();
    println!("Store: {}", args.data_dir.display());
    println!();

    let report = runtime.block_on(pipeline::run(store, lookup, &config))?;

    println!("Processed: {} upload(s)", report.processed);
    if !report.failed.is_empty() {
        println!(
            "Failed:    {} (left in incoming/ for retry)",
            report.failed.len()
        );
        for (key, reason) in &report.failed {
            println!("  {}: {}", key, reason);
        }
    }
    println!("Pilots updated:      {}", report.pilots_updated);
    println!("Leaderboard entries: {}", report.leaderboard_entries);

    Ok(())
}
