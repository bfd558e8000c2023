//! Market identifiers, top-of-book, and depth views.
//!
//! Order books arrive from the exchange as two resting-bid ladders,
//! one per contract side. All pricing logic runs in YES space: a NO
//! bid at p is a YES ask at 1 - p.

use crate::price::Price;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique market identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticker(pub String);

impl Ticker {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Ticker {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Best bid and ask for the YES contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Touch {
    pub bid: Price,
    pub ask: Price,
}

impl Touch {
    pub fn new(bid: Price, ask: Price) -> Self {
        Self { bid, ask }
    }

    pub fn spread(&self) -> Decimal {
        self.ask.inner() - self.bid.inner()
    }

    pub fn mid(&self) -> Decimal {
        (self.bid.inner() + self.ask.inner()) / Decimal::TWO
    }

    /// True when both quotes are inside the quotable range and crossed
    /// books are rejected.
    pub fn is_valid(&self) -> bool {
        self.bid >= Price::MIN && self.ask <= Price::MAX && self.bid.inner() < self.ask.inner()
    }
}

/// Raw order book: resting bids per contract side, price in dollars.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    /// Resting YES bids as (price, contracts).
    pub yes: Vec<(Price, i64)>,
    /// Resting NO bids as (price, contracts).
    pub no: Vec<(Price, i64)>,
}

impl OrderBook {
    /// Best YES bid level, ticked.
    pub fn best_yes_bid(&self) -> Option<(Price, i64)> {
        self.yes
            .iter()
            .max_by_key(|(p, _)| *p)
            .map(|&(p, sz)| (Price::tick(p.inner()), sz))
    }

    /// Best YES ask level: the highest NO bid mapped through 1 - p.
    pub fn best_yes_ask(&self) -> Option<(Price, i64)> {
        self.no
            .iter()
            .max_by_key(|(p, _)| *p)
            .map(|&(p, sz)| (p.complement(), sz))
    }

    /// True when either side's top `depth` levels hold fewer than
    /// `floor` contracts in aggregate. An empty side is always thin.
    pub fn is_thin(&self, floor: i64, depth: usize) -> bool {
        Self::top_depth(&self.yes, depth) < floor || Self::top_depth(&self.no, depth) < floor
    }

    fn top_depth(levels: &[(Price, i64)], depth: usize) -> i64 {
        let mut by_price: Vec<&(Price, i64)> = levels.iter().collect();
        by_price.sort_by(|a, b| b.0.cmp(&a.0));
        by_price.into_iter().take(depth).map(|&(_, sz)| sz).sum()
    }
}

/// A market enrolled in the exchange's liquidity incentive program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityProgram {
    pub ticker: Ticker,
    /// Resting depth the program wants at the touch.
    pub target_size: i64,
    /// Reward pool in dollars.
    pub reward: Decimal,
    pub start_ts: Option<DateTime<Utc>>,
    pub end_ts: Option<DateTime<Utc>>,
    /// Reward discount heuristic in [0, 1]; 0.5 when the listing
    /// omits it.
    pub discount_factor: Decimal,
}

/// A scored candidate produced by market discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryCandidate {
    pub ticker: Ticker,
    pub side: crate::order::Side,
    pub target_size: i64,
    pub best_price: Price,
    /// Contracts still missing toward the program target.
    pub amount_needed: i64,
    pub best_size: i64,
    /// best_size / target_size, clipped to [0, 1].
    pub coverage: Decimal,
    pub spread: Decimal,
    /// Reward discount heuristic in [0, 1].
    pub discount_factor: Decimal,
    pub reward_pool: Decimal,
    pub end_ts: Option<DateTime<Utc>>,
    /// Composite score scaled to 0..=1000, higher is better.
    pub score: i64,
}

/// Shared tick step for quote adjustments.
pub const TICK: Decimal = dec!(0.01);

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book() -> OrderBook {
        OrderBook {
            yes: vec![
                (Price::new(dec!(0.38)), 120),
                (Price::new(dec!(0.40)), 150),
                (Price::new(dec!(0.35)), 500),
            ],
            no: vec![
                (Price::new(dec!(0.55)), 80),
                (Price::new(dec!(0.52)), 300),
            ],
        }
    }

    #[test]
    fn test_best_yes_bid_is_highest_level() {
        let (price, size) = book().best_yes_bid().unwrap();
        assert_eq!(price.inner(), dec!(0.40));
        assert_eq!(size, 150);
    }

    #[test]
    fn test_best_yes_ask_maps_no_side() {
        let (price, size) = book().best_yes_ask().unwrap();
        assert_eq!(price.inner(), dec!(0.45));
        assert_eq!(size, 80);
    }

    #[test]
    fn test_empty_side_has_no_ask() {
        let b = OrderBook {
            yes: vec![(Price::new(dec!(0.40)), 10)],
            no: vec![],
        };
        assert!(b.best_yes_ask().is_none());
    }

    #[test]
    fn test_thin_book_detection() {
        let b = book();
        // yes top-2 = 270, no top-2 = 380
        assert!(!b.is_thin(200, 2));
        assert!(b.is_thin(300, 2));
        assert!(OrderBook::default().is_thin(200, 2));
    }

    #[test]
    fn test_touch_validity() {
        let t = Touch::new(Price::new(dec!(0.40)), Price::new(dec!(0.45)));
        assert!(t.is_valid());
        assert_eq!(t.spread(), dec!(0.05));
        let crossed = Touch::new(Price::new(dec!(0.45)), Price::new(dec!(0.45)));
        assert!(!crossed.is_valid());
    }
}
