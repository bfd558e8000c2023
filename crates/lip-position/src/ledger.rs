//! Position tracking in YES-equivalent space.
//!
//! The ledger is the single source of truth for inventory and P&L and
//! is updated only from the fill stream, never from quoting decisions.
//! NO-side fills are folded into the YES contract before accounting.

use lip_core::{Action, Fill, Side, Ticker};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Per-market position state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Position {
    /// Signed YES-equivalent contracts (positive = long YES).
    pub inventory: i64,
    /// Average entry price of the open position, zero when flat.
    pub avg_price: Decimal,
    /// Cumulative realized P&L in dollars.
    pub realized_pnl: Decimal,
}

/// Thread-safe ledger shared between the fill listener and the
/// per-market processors.
#[derive(Debug, Default)]
pub struct PositionLedger {
    positions: Mutex<HashMap<Ticker, Position>>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one execution. Same-direction fills extend the position at
    /// a size-weighted average price; opposing fills realize P&L on the
    /// closed portion and any excess opens a reversed position at the
    /// fill price. An exact close resets the average to zero.
    pub fn apply_fill(&self, fill: &Fill) {
        // The wire already reports the YES-space trade price, so a
        // NO-side fill only flips the direction.
        let action = match fill.side {
            Side::Yes => fill.action,
            Side::No => fill.action.opposite(),
        };
        let signed = match action {
            Action::Buy => fill.count,
            Action::Sell => -fill.count,
        };
        if signed == 0 {
            return;
        }

        let mut positions = self.positions.lock();
        let pos = positions.entry(fill.ticker.clone()).or_default();
        let fill_price = fill.yes_price.inner();

        let old = pos.inventory;
        let new = old + signed;

        if (old > 0 && signed < 0) || (old < 0 && signed > 0) {
            let closed = Decimal::from(signed.abs().min(old.abs()));
            let pnl = if old > 0 {
                (fill_price - pos.avg_price) * closed
            } else {
                (pos.avg_price - fill_price) * closed
            };
            pos.realized_pnl += pnl;
        }

        if new == 0 {
            pos.avg_price = Decimal::ZERO;
        } else if old != 0 && new.signum() != old.signum() {
            // Flipped through flat: remainder opens at the fill price.
            pos.avg_price = fill_price;
        } else if old == 0 || new.signum() == signed.signum() {
            let old_notional = Decimal::from(old.abs()) * pos.avg_price;
            let add_notional = Decimal::from(signed.abs()) * fill_price;
            pos.avg_price = (old_notional + add_notional) / Decimal::from(new.abs());
        }
        // else: reduction, avg_price unchanged

        pos.inventory = new;
        debug!(
            ticker = %fill.ticker,
            inventory = pos.inventory,
            avg_price = %pos.avg_price,
            realized_pnl = %pos.realized_pnl,
            "ledger updated"
        );
    }

    /// Position snapshot for one market (zeroed default when untracked).
    pub fn get(&self, ticker: &Ticker) -> Position {
        self.positions.lock().get(ticker).copied().unwrap_or_default()
    }

    pub fn inventory(&self, ticker: &Ticker) -> i64 {
        self.get(ticker).inventory
    }

    pub fn total_realized_pnl(&self) -> Decimal {
        self.positions.lock().values().map(|p| p.realized_pnl).sum()
    }

    /// Realized plus marked-to-mid unrealized P&L. Markets without a
    /// usable mid are marked at their own average entry (zero
    /// unrealized contribution).
    pub fn total_pnl<F>(&self, mid_of: F) -> Decimal
    where
        F: Fn(&Ticker) -> Option<Decimal>,
    {
        self.positions
            .lock()
            .iter()
            .map(|(ticker, pos)| {
                let mut pnl = pos.realized_pnl;
                if pos.inventory != 0 {
                    let mark = mid_of(ticker).unwrap_or(pos.avg_price);
                    pnl += (mark - pos.avg_price) * Decimal::from(pos.inventory);
                }
                pnl
            })
            .sum()
    }

    /// All markets with a nonzero open position.
    pub fn open_positions(&self) -> Vec<(Ticker, Position)> {
        self.positions
            .lock()
            .iter()
            .filter(|(_, p)| p.inventory != 0)
            .map(|(t, p)| (t.clone(), *p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lip_core::{Price, Side};
    use rust_decimal_macros::dec;

    fn fill(side: Side, action: Action, count: i64, yes_price: Decimal) -> Fill {
        Fill {
            ticker: Ticker::from("TEST-MKT"),
            side,
            action,
            count,
            yes_price: Price::new(yes_price),
            ts: Utc::now(),
        }
    }

    fn ticker() -> Ticker {
        Ticker::from("TEST-MKT")
    }

    #[test]
    fn test_buy_then_full_close_realizes_pnl() {
        let ledger = PositionLedger::new();
        ledger.apply_fill(&fill(Side::Yes, Action::Buy, 50, dec!(0.40)));
        ledger.apply_fill(&fill(Side::Yes, Action::Sell, 50, dec!(0.45)));

        let pos = ledger.get(&ticker());
        assert_eq!(pos.inventory, 0);
        assert_eq!(pos.avg_price, dec!(0));
        assert_eq!(pos.realized_pnl, dec!(2.50));
    }

    #[test]
    fn test_same_direction_weighted_average() {
        let ledger = PositionLedger::new();
        ledger.apply_fill(&fill(Side::Yes, Action::Buy, 10, dec!(0.40)));
        ledger.apply_fill(&fill(Side::Yes, Action::Buy, 30, dec!(0.48)));

        let pos = ledger.get(&ticker());
        assert_eq!(pos.inventory, 40);
        assert_eq!(pos.avg_price, dec!(0.46));
    }

    #[test]
    fn test_partial_close_keeps_avg_price() {
        let ledger = PositionLedger::new();
        ledger.apply_fill(&fill(Side::Yes, Action::Buy, 40, dec!(0.40)));
        ledger.apply_fill(&fill(Side::Yes, Action::Sell, 10, dec!(0.50)));

        let pos = ledger.get(&ticker());
        assert_eq!(pos.inventory, 30);
        assert_eq!(pos.avg_price, dec!(0.40));
        assert_eq!(pos.realized_pnl, dec!(1.00));
    }

    #[test]
    fn test_flip_opens_at_fill_price() {
        let ledger = PositionLedger::new();
        ledger.apply_fill(&fill(Side::Yes, Action::Buy, 10, dec!(0.40)));
        ledger.apply_fill(&fill(Side::Yes, Action::Sell, 25, dec!(0.44)));

        let pos = ledger.get(&ticker());
        assert_eq!(pos.inventory, -15);
        assert_eq!(pos.avg_price, dec!(0.44));
        // 10 closed at +0.04 each
        assert_eq!(pos.realized_pnl, dec!(0.40));
    }

    #[test]
    fn test_no_side_fill_folds_into_yes() {
        let ledger = PositionLedger::new();
        // Buying NO at 0.55 is selling YES at 0.45.
        ledger.apply_fill(&fill(Side::Yes, Action::Buy, 20, dec!(0.40)));
        ledger.apply_fill(&Fill {
            ticker: ticker(),
            side: Side::No,
            action: Action::Buy,
            count: 20,
            yes_price: Price::new(dec!(0.45)),
            ts: Utc::now(),
        });

        let pos = ledger.get(&ticker());
        assert_eq!(pos.inventory, 0);
        assert_eq!(pos.realized_pnl, dec!(1.00));
    }

    #[test]
    fn test_total_pnl_with_mid_fallback() {
        let ledger = PositionLedger::new();
        ledger.apply_fill(&fill(Side::Yes, Action::Buy, 10, dec!(0.40)));

        // Mid available: unrealized (0.45 - 0.40) * 10
        let pnl = ledger.total_pnl(|_| Some(dec!(0.45)));
        assert_eq!(pnl, dec!(0.50));

        // No mid: marked at avg entry, zero unrealized
        let pnl = ledger.total_pnl(|_| None);
        assert_eq!(pnl, dec!(0));
    }
}
