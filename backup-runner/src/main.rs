//! Backup Runner - Main entry point
//!
//! Meant to be started by a timer; each run is one short-lived process.

use anyhow::Result;
use backup_runner::config::{Config, Overrides};
use backup_runner::executor::retention::PruneResult;
use backup_runner::store::BorgStore;
use backup_runner::{utils, Executor, RunOptions, RunOutcome};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "/etc/backup-runner/config.toml")]
    config: PathBuf,

    /// Source directory (overrides config)
    #[arg(short, long, value_name = "DIR")]
    source: Option<PathBuf>,

    /// Repository path (overrides config)
    #[arg(short, long, value_name = "DIR")]
    destination: Option<PathBuf>,

    /// Backup mode: incremental, full or storeauto (overrides config)
    #[arg(short, long)]
    mode: Option<String>,

    /// Change window in minutes for incremental mode (overrides config)
    #[arg(short = 'w', long, value_name = "MINUTES", allow_hyphen_values = true)]
    time_window: Option<String>,

    /// Plan and print the store operations without running them
    #[arg(long)]
    dry_run: bool,

    /// Verbose output (debug logging)
    #[arg(short, long)]
    verbose: bool,

    /// Re-initialize the repository even if it already exists (destroys it)
    #[arg(long)]
    force_init: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let overrides = Overrides {
        source: args.source.clone(),
        destination: args.destination.clone(),
        mode: args.mode.clone(),
        time_window_minutes: args.time_window.clone(),
    };
    let config = Config::load_with(&args.config, &overrides)?;

    // Initialize logging
    let log_level = if args.verbose {
        "debug"
    } else {
        args.log_level.as_deref().unwrap_or(&config.log_level)
    };
    utils::logger::init(log_level)?;

    tracing::info!(
        "Starting backup-runner v{} (config: {})",
        env!("CARGO_PKG_VERSION"),
        args.config.display()
    );

    let store = BorgStore::from_config(&config);
    let options = RunOptions {
        dry_run: args.dry_run,
        force_init: args.force_init,
    };

    let outcome = match Executor::new(&store, options).run(&config, Utc::now()) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(stage = e.stage(), error = %e, "Backup run failed");
            return Err(e.into());
        }
    };

    match outcome {
        RunOutcome::Skipped => tracing::info!("Run complete: nothing to back up"),
        RunOutcome::Created { label, files, prune } => {
            let prune = match prune {
                PruneResult::Pruned => "pruned",
                PruneResult::Failed(_) => "prune failed",
            };
            match files {
                Some(count) => tracing::info!("Run complete: {} ({} files, {})", label, count, prune),
                None => tracing::info!("Run complete: {} (whole tree, {})", label, prune),
            }
        }
        RunOutcome::DryRun { steps } => {
            for step in steps {
                println!("{}", serde_json::to_string(&step)?);
            }
        }
    }

    Ok(())
}
