//! Feed error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("auth header generation failed: {0}")]
    Auth(String),

    #[error("message parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("fill channel closed")]
    ChannelClosed,

    #[error("server error on fill channel: {0}")]
    Server(String),
}

pub type FeedResult<T> = Result<T, FeedError>;
