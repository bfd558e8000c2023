//! Order and trade primitives.

use crate::price::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Contract side of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => write!(f, "yes"),
            Self::No => write!(f, "no"),
        }
    }
}

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Exchange-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live order resting on the exchange, as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestingOrder {
    pub id: OrderId,
    pub ticker: crate::market::Ticker,
    pub side: Side,
    pub action: Action,
    pub price: Price,
    /// Unfilled contract count.
    pub remaining: i64,
}

/// An execution reported by the fill stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub ticker: crate::market::Ticker,
    pub side: Side,
    pub action: Action,
    pub count: i64,
    /// YES-side dollar price of the trade.
    pub yes_price: Price,
    pub ts: DateTime<Utc>,
}

/// Map a (side, action, price) triple onto the YES contract.
///
/// Buying NO at p is selling YES at 1 - p, and vice versa; YES orders
/// pass through unchanged. All inventory and P&L accounting happens in
/// this space.
pub fn yes_equivalent(side: Side, action: Action, price: Price) -> (Action, Price) {
    match side {
        Side::Yes => (action, price),
        Side::No => (action.opposite(), price.complement()),
    }
}
