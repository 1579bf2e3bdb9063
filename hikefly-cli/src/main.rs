//! HikeFly CLI - Batch scoring pipeline for hike-and-fly competitions.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hikefly",
    version = hikefly::VERSION,
    about = "Scores uploaded flight tracks and maintains the competition leaderboard"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score new uploads and rebuild pilot records and the leaderboard
    Process {
        /// Root directory of the object store
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
    /// Delete everything under scores/ and re-initialize an empty
    /// leaderboard; uploads and archives are never touched
    Reset {
        /// Root directory of the object store
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
        /// Preview deletions without performing them
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Process { data_dir } => {
            commands::process::run(commands::process::ProcessArgs { data_dir })
        }
        Commands::Reset { data_dir, dry_run } => {
            commands::reset::run(commands::reset::ResetArgs { data_dir, dry_run })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_process_parses_data_dir() {
        let cli = Cli::parse_from(["hikefly", "process", "--data-dir", "/tmp/bucket"]);
        match cli.command {
            Commands::Process { data_dir } => {
                assert_eq!(data_dir, PathBuf::from("/tmp/bucket"));
            }
            _ => panic!("expected process command"),
        }
    }

    #[test]
    fn test_reset_dry_run_flag() {
        let cli = Cli::parse_from(["hikefly", "reset", "--dry-run"]);
        match cli.command {
            Commands::Reset { dry_run, .. } => assert!(dry_run),
            _ => panic!("expected reset command"),
        }
    }
}
