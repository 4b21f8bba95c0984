//! `prune-records`: delete old exchange records after backing up the database.
//!
//! Usage: `prune-records <DB_PATH> <ACCOUNT> [-b <BEFORE_DATE>] [-a <AFTER_DATE>]`

use std::io;

use clap::Parser;

use record_pruner::cli::Cli;
use record_pruner::config::PruneConfig;
use record_pruner::orchestrator;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let stdin = io::stdin();
    let result = PruneConfig::from_cli(Cli::parse()).and_then(|config| {
        log::info!("Pruning {}", config.db_path.display());
        orchestrator::run(&config, stdin.lock(), io::stdout())
    });
    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            if e.is_input_error() {
                log::error!("Invalid input, nothing was backed up or deleted");
            }
            return Err(e.into());
        }
    };

    log::info!(
        "Done: {} records deleted, backup at {}, {} old backups removed",
        summary.report.total_deleted(),
        summary.backup.path.display(),
        summary.sweep.removed
    );
    Ok(())
}
