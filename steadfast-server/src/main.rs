//! Steadfast Server - Headless Daemon
//!
//! Exposes the data-access contract over HTTP on /api/*, keeps the periodic
//! primary health probe running, and falls back to the secondary transport
//! while the primary is down.
//!
//! Access via: http://localhost:8050

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod cli;
mod commands;
mod router;
mod server_utils;
mod state;
#[cfg(test)]
mod test_helpers;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        None => serve(&cli.host, cli.port).await,
        Some(Commands::Serve { port }) => serve(&cli.host, port).await,
        Some(Commands::Probe) => commands::handle_probe().await,
        Some(Commands::Config(cmd)) => commands::handle_config_command(cmd),
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn serve(host: &str, port: u16) -> Result<()> {
    info!("🚀 Steadfast Server starting on port {}...", port);

    let config = steadfast_core::config::load_config().map_err(|e| anyhow::anyhow!(e))?;
    steadfast_core::metrics::init_metrics()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics recorder: {}", e))?;

    let state = AppState::from_config(config).await?;
    let access = state.access().clone();
    info!("✅ Application state initialized");

    access.start_background_probe();
    // Settle the initial mode instead of waiting a full interval
    access.monitor().trigger_probe();

    let app = router::build_router(state);
    let listener = server_utils::create_listener(host, port).await?;

    info!("🌐 Server listening on http://{}:{}", host, port);
    info!("🔌 API available at http://{}:{}/api/", host, port);

    axum::serve(listener, app).with_graceful_shutdown(server_utils::shutdown_signal()).await?;

    access.shutdown().await;
    info!("👋 Server stopped");
    Ok(())
}
