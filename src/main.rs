//! Main entry point for the telemetry-report CLI

use clap::Parser;
use telemetry_report::cli::{Cli, Commands};
use telemetry_report::shutdown::{self, ShutdownCoordinator};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("telemetry_report=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    // Ctrl+C requests an interrupt; the engine honors it between windows
    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received, finishing the current window...");
                shutdown.request_shutdown();
            }
        }
    });

    let result: anyhow::Result<()> = match cli.command {
        Commands::Report(ref args) => args.execute(shutdown).await.map_err(anyhow::Error::from),
    };

    if let Err(e) = result {
        error!("Command failed: {e}");
        std::process::exit(1);
    }
}
