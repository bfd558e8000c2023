//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Trading API error: {0}")]
    Api(#[from] lip_exchange::ApiError),

    #[error("Feed error: {0}")]
    Feed(#[from] lip_feed::FeedError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] lip_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
