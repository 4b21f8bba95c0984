//! `analytics-wrapper`: runs the analytics server in the foreground.
//!
//! Seeds the server's database from `MB_DB_INIT_SQL_FILE` on first start,
//! forwards SIGINT/SIGTERM to the server as a graceful terminate, and exports
//! the database to `MB_DB_SAVE_TO_SQL_FILE` once the server exits.

use record_pruner::config::WrapperConfig;
use record_pruner::supervisor::{run_analytics_server, Supervisor};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = WrapperConfig::from_env();
    let supervisor = Supervisor::with_shutdown_signals()?;

    let status = run_analytics_server(&config, &supervisor).await?;
    if supervisor.token().is_cancelled() {
        log::info!("Server stopped on request ({})", status);
    } else if !status.success() {
        anyhow::bail!("Server exited with {}", status);
    }
    Ok(())
}
