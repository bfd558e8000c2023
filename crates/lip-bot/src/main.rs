//! Liquidity-incentive-program market maker - entry point.

use anyhow::Result;
use clap::Parser;
use lip_bot::OperatingMode;
use tracing::info;

/// Liquidity-incentive-program market maker for binary-outcome markets
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via LIP_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    lip_feed::init_crypto();

    let args = Args::parse();

    lip_telemetry::init_logging()?;

    info!("Starting lip-bot v{}", env!("CARGO_PKG_VERSION"));

    // Determine config path: CLI arg > LIP_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("LIP_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = lip_bot::AppConfig::from_file(&config_path)?;

    let app = match config.mode {
        OperatingMode::Paper => {
            info!("paper mode: orders go to the in-memory exchange");
            lip_bot::Application::paper(config)
        }
        OperatingMode::Live => {
            // The live exchange client (auth and signing) is linked in
            // by the deployment build, not this workspace.
            anyhow::bail!("live mode requires an exchange client binding");
        }
    };

    app.run().await?;

    Ok(())
}
