//! Structured logging initialization.

use crate::error::TelemetryResult;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging.
///
/// JSON output when `LIP_LOG_FORMAT=json` or `RUST_ENV=production`,
/// pretty output otherwise. The downstream log pipeline expects the
/// JSON form; pretty is for local runs.
pub fn init_logging() -> TelemetryResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,lip=debug"));

    let json = match std::env::var("LIP_LOG_FORMAT") {
        Ok(v) => v == "json",
        Err(_) => std::env::var("RUST_ENV")
            .map(|v| v == "production")
            .unwrap_or(false),
    };

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(true))
            .init();
    }

    Ok(())
}
