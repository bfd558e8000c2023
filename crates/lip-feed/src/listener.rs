//! Reconnecting fill stream listener.

use crate::auth::StreamAuth;
use crate::error::{FeedError, FeedResult};
use crate::message::{SubscribeCommand, WsMessage};
use futures_util::{SinkExt, StreamExt};
use lip_core::Fill;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub url: String,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            url: "wss://api.elections.kalshi.com/trade-api/ws/v2".to_string(),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}

/// Owns the private fill subscription for the lifetime of the process.
///
/// Reconnects forever with exponential backoff; the backoff resets
/// after every successful handshake. Stops only on cancellation or
/// when the fill channel receiver is dropped.
pub struct FillStreamListener {
    config: ListenerConfig,
    auth: Arc<dyn StreamAuth>,
    fills: mpsc::Sender<Fill>,
    cancel: CancellationToken,
    next_cmd_id: u64,
}

impl FillStreamListener {
    pub fn new(
        config: ListenerConfig,
        auth: Arc<dyn StreamAuth>,
        fills: mpsc::Sender<Fill>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            auth,
            fills,
            cancel,
            next_cmd_id: 0,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        let mut backoff = self.config.initial_backoff;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.session(&mut backoff).await {
                // Session only returns Ok on cooperative shutdown.
                Ok(()) => break,
                Err(err) => warn!(%err, "fill stream session ended"),
            }
            debug!(delay_ms = backoff.as_millis() as u64, "reconnecting fill stream");
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(backoff) => {}
            }
            backoff = next_backoff(backoff, self.config.max_backoff);
        }
        info!("fill stream listener stopped");
    }

    async fn session(&mut self, backoff: &mut Duration) -> FeedResult<()> {
        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(FeedError::WebSocket)?;
        // Signed headers expire quickly, so they are generated fresh
        // for every attempt.
        for (name, value) in self.auth.headers()? {
            let name =
                HeaderName::try_from(name.as_str()).map_err(|e| FeedError::Auth(e.to_string()))?;
            let value =
                HeaderValue::try_from(value.as_str()).map_err(|e| FeedError::Auth(e.to_string()))?;
            request.headers_mut().insert(name, value);
        }

        let (ws, _) = connect_async(request).await?;
        let (mut write, mut read) = ws.split();

        self.next_cmd_id += 1;
        let subscribe = SubscribeCommand::fills(self.next_cmd_id);
        write
            .send(Message::Text(serde_json::to_string(&subscribe)?))
            .await?;
        info!(url = %self.config.url, "fill stream connected, subscription sent");
        *backoff = self.config.initial_backoff;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                frame = read.next() => {
                    let Some(frame) = frame else {
                        return Err(FeedError::ChannelClosed);
                    };
                    match frame? {
                        Message::Text(text) => self.handle_text(&text).await?,
                        Message::Ping(payload) => write.send(Message::Pong(payload)).await?,
                        Message::Close(_) => return Err(FeedError::ChannelClosed),
                        _ => {}
                    }
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) -> FeedResult<()> {
        match serde_json::from_str::<WsMessage>(text) {
            Ok(WsMessage::Subscribed(sub)) => {
                info!(channel = ?sub.channel, sid = ?sub.sid, "fill channel subscribed");
            }
            Ok(WsMessage::Fill(payload)) => match payload.into_fill() {
                Some(fill) => {
                    debug!(ticker = %fill.ticker, count = fill.count, "fill received");
                    if self.fills.send(fill).await.is_err() {
                        return Err(FeedError::ChannelClosed);
                    }
                }
                None => warn!("fill message missing price, dropped"),
            },
            Ok(WsMessage::Error(err)) => {
                warn!(code = ?err.code, msg = ?err.msg, "fill channel server error");
            }
            Ok(WsMessage::Unknown) => {}
            Err(err) => warn!(%err, "unparseable fill channel frame"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::NoAuth;
    use rust_decimal_macros::dec;

    fn listener(fills: mpsc::Sender<Fill>) -> FillStreamListener {
        FillStreamListener::new(
            ListenerConfig::default(),
            Arc::new(NoAuth),
            fills,
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_backoff_doubles_to_cap() {
        let max = Duration::from_secs(60);
        let mut delay = Duration::from_secs(1);
        let mut seen = Vec::new();
        for _ in 0..8 {
            delay = next_backoff(delay, max);
            seen.push(delay.as_secs());
        }
        assert_eq!(seen, vec![2, 4, 8, 16, 32, 60, 60, 60]);
    }

    #[tokio::test]
    async fn test_fill_frame_routed_to_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let l = listener(tx);
        let raw = r#"{"type":"fill","msg":{
            "market_ticker":"TEST-MKT","side":"yes","action":"sell",
            "yes_price_dollars":"0.45","count":7,"ts":1700000000}}"#;
        l.handle_text(raw).await.unwrap();

        let fill = rx.recv().await.unwrap();
        assert_eq!(fill.ticker.as_str(), "TEST-MKT");
        assert_eq!(fill.yes_price.inner(), dec!(0.45));
        assert_eq!(fill.count, 7);
    }

    #[tokio::test]
    async fn test_server_error_frame_tolerated() {
        let (tx, _rx) = mpsc::channel(8);
        let l = listener(tx);
        let raw = r#"{"type":"error","msg":{"code":6,"msg":"bad subscription"}}"#;
        assert!(l.handle_text(raw).await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_listener() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let l = listener(tx);
        let raw = r#"{"type":"fill","msg":{
            "market_ticker":"TEST-MKT","side":"yes","action":"buy",
            "yes_price":40,"count":1}}"#;
        assert!(matches!(
            l.handle_text(raw).await,
            Err(FeedError::ChannelClosed)
        ));
    }
}
