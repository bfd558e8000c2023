//! Wire messages for the fill channel.

use chrono::{DateTime, TimeZone, Utc};
use lip_core::{Action, Fill, Price, Side, Ticker};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outbound subscription command.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeCommand {
    pub id: u64,
    pub cmd: &'static str,
    pub params: SubscribeParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeParams {
    pub channels: Vec<&'static str>,
}

impl SubscribeCommand {
    pub fn fills(id: u64) -> Self {
        Self {
            id,
            cmd: "subscribe",
            params: SubscribeParams {
                channels: vec!["fill"],
            },
        }
    }
}

/// Inbound message envelope: `{"type": ..., "msg": {...}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "msg", rename_all = "snake_case")]
pub enum WsMessage {
    Subscribed(SubscribedPayload),
    Fill(FillPayload),
    Error(ErrorPayload),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribedPayload {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub sid: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
}

/// One execution as reported by the exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct FillPayload {
    #[serde(default)]
    pub trade_id: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    pub market_ticker: String,
    #[serde(default)]
    pub is_taker: bool,
    pub side: Side,
    pub action: Action,
    /// YES price in cents.
    #[serde(default)]
    pub yes_price: Option<i64>,
    /// YES price in dollars, preferred when present.
    #[serde(default)]
    pub yes_price_dollars: Option<Decimal>,
    pub count: i64,
    /// Epoch seconds.
    #[serde(default)]
    pub ts: Option<i64>,
    /// Exchange-reported position after this fill.
    #[serde(default)]
    pub post_position: Option<i64>,
}

impl FillPayload {
    /// Convert to the domain fill. Returns `None` when no price field
    /// is present (malformed message).
    pub fn into_fill(self) -> Option<Fill> {
        let yes_price = match (self.yes_price_dollars, self.yes_price) {
            (Some(dollars), _) => Price::tick(dollars),
            (None, Some(cents)) => Price::tick(Decimal::from(cents) / Decimal::from(100)),
            (None, None) => return None,
        };
        let ts: DateTime<Utc> = self
            .ts
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now);
        Some(Fill {
            ticker: Ticker::new(self.market_ticker),
            side: self.side,
            action: self.action,
            count: self.count,
            yes_price,
            ts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_subscribe_command_shape() {
        let cmd = SubscribeCommand::fills(1);
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 1,
                "cmd": "subscribe",
                "params": {"channels": ["fill"]}
            })
        );
    }

    #[test]
    fn test_parse_fill_message() {
        let raw = r#"{
            "type": "fill",
            "msg": {
                "trade_id": "t-1",
                "order_id": "o-1",
                "market_ticker": "TEST-MKT",
                "is_taker": false,
                "side": "yes",
                "action": "buy",
                "yes_price": 40,
                "yes_price_dollars": "0.40",
                "count": 10,
                "ts": 1700000000,
                "post_position": 10
            }
        }"#;
        let msg: WsMessage = serde_json::from_str(raw).unwrap();
        let WsMessage::Fill(payload) = msg else {
            panic!("expected fill");
        };
        let fill = payload.into_fill().unwrap();
        assert_eq!(fill.ticker.as_str(), "TEST-MKT");
        assert_eq!(fill.yes_price.inner(), dec!(0.40));
        assert_eq!(fill.count, 10);
        assert_eq!(fill.action, Action::Buy);
    }

    #[test]
    fn test_cents_fallback() {
        let payload = FillPayload {
            trade_id: None,
            order_id: None,
            market_ticker: "TEST-MKT".to_string(),
            is_taker: true,
            side: Side::No,
            action: Action::Sell,
            yes_price: Some(63),
            yes_price_dollars: None,
            count: 5,
            ts: None,
            post_position: None,
        };
        let fill = payload.into_fill().unwrap();
        assert_eq!(fill.yes_price.inner(), dec!(0.63));
    }

    #[test]
    fn test_missing_price_rejected() {
        let payload = FillPayload {
            trade_id: None,
            order_id: None,
            market_ticker: "TEST-MKT".to_string(),
            is_taker: false,
            side: Side::Yes,
            action: Action::Buy,
            yes_price: None,
            yes_price_dollars: None,
            count: 5,
            ts: None,
            post_position: None,
        };
        assert!(payload.into_fill().is_none());
    }

    #[test]
    fn test_unknown_message_type_tolerated() {
        let msg: WsMessage = serde_json::from_str(r#"{"type": "heartbeat"}"#).unwrap();
        assert!(matches!(msg, WsMessage::Unknown));
    }
}
