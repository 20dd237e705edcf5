mod config;
mod error;
mod feed;
mod format;
mod matcher;
mod monitor;
mod notify;
mod seen;

use feed::FeedClient;
use futures::StreamExt;
use monitor::Monitor;
use signal_hook::consts::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook_tokio::Signals;
use tracing_subscriber::prelude::*;

/// Used when no configuration path is given on the command line.
const DEFAULT_CONFIG_PATH: &str = "config/settings.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with env-declared filters.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "notice_watch=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting notice-watch");

    //
    // Load configuration. Any problem here ends the process before monitoring starts.
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = config::Config::load(&config_path)?;
    tracing::info!("Configuration loaded from {config_path}");

    //
    // Initialize components.
    let source = FeedClient::new(&config.timeouts)?;
    let channels = notify::build_channels(&config)?;
    let mut monitor = Monitor::new(&config, Box::new(source), channels);

    //
    // Spawn the monitor.
    let mut monitor_handle = tokio::spawn(async move { monitor.run().await });

    //
    // Handle signals.
    let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT])?;
    let signals_handle = signals.handle();

    tokio::select! {
        Some(signal) = signals.next() => {
            tracing::info!("Received signal {signal}, shutting down");
            monitor_handle.abort();
        }
        result = &mut monitor_handle => match result {
            Ok(summary) => tracing::info!(
                "Finished after {} checks, {} of {} deliveries succeeded",
                summary.checks,
                summary.outcomes.iter().filter(|outcome| outcome.success).count(),
                summary.outcomes.len()
            ),
            Err(error) => tracing::error!("Monitor stopped unexpectedly: {error}"),
        },
    }

    signals_handle.close();
    Ok(())
}
