//! WebSocket fill stream.
//!
//! Maintains an authenticated subscription to the exchange's private
//! fill channel with:
//! - Automatic reconnection with exponential backoff (1s doubling to 60s)
//! - Fresh auth headers per connection attempt
//! - Fills delivered over a bounded mpsc channel
//! - Cooperative shutdown via CancellationToken

pub mod auth;
pub mod error;
pub mod listener;
pub mod message;

pub use auth::{NoAuth, StreamAuth};
pub use error::{FeedError, FeedResult};
pub use listener::{FillStreamListener, ListenerConfig};
pub use message::{FillPayload, SubscribeCommand, WsMessage};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
