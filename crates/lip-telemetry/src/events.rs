//! Structured trading event records.
//!
//! One `tracing` event per business occurrence, all under the
//! `lip::events` target so the log pipeline can route them without
//! parsing message text.

use lip_core::{Action, Fill, Side, Ticker};
use rust_decimal::Decimal;
use tracing::info;

const TARGET: &str = "lip::events";

/// Emitters for the trading event stream.
///
/// Stateless; exists so call sites read as `events.fill(..)` rather
/// than raw macro invocations scattered through business logic.
#[derive(Debug, Clone, Copy, Default)]
pub struct TradingEvents;

impl TradingEvents {
    pub fn startup(&self, version: &str) {
        info!(target: TARGET, event = "startup", version, "maker starting");
    }

    pub fn shutdown(&self, reason: &str) {
        info!(target: TARGET, event = "shutdown", reason, "maker stopping");
    }

    pub fn fill(&self, fill: &Fill) {
        info!(
            target: TARGET,
            event = "fill",
            ticker = %fill.ticker,
            side = %fill.side,
            action = %fill.action,
            count = fill.count,
            yes_price = %fill.yes_price,
            "fill received"
        );
    }

    pub fn order_placed(
        &self,
        ticker: &Ticker,
        side: Side,
        action: Action,
        price: Decimal,
        count: i64,
    ) {
        info!(
            target: TARGET,
            event = "order_placed",
            ticker = %ticker,
            side = %side,
            action = %action,
            price = %price,
            count,
            "order placed"
        );
    }

    pub fn inventory(&self, ticker: &Ticker, inventory: i64, avg_price: Decimal) {
        info!(
            target: TARGET,
            event = "inventory",
            ticker = %ticker,
            inventory,
            avg_price = %avg_price,
            "inventory updated"
        );
    }

    pub fn pnl_snapshot(&self, total_pnl: Decimal, realized: Decimal) {
        info!(
            target: TARGET,
            event = "pnl_snapshot",
            total_pnl = %total_pnl,
            realized = %realized,
            "portfolio pnl"
        );
    }

    pub fn toxicity(&self, ticker: &Ticker, ema: Decimal, edge_bonus: Decimal, width_bonus: Decimal) {
        info!(
            target: TARGET,
            event = "toxicity",
            ticker = %ticker,
            ema = %ema,
            edge_bonus = %edge_bonus,
            width_bonus = %width_bonus,
            "toxicity state"
        );
    }

    pub fn markout(&self, ticker: &Ticker, horizon: &str, markout: Decimal, ema: Decimal) {
        info!(
            target: TARGET,
            event = "markout",
            ticker = %ticker,
            horizon,
            markout = %markout,
            ema = %ema,
            "markout checkpoint"
        );
    }

    pub fn market_tracked(&self, ticker: &Ticker, score: i64, target_size: i64) {
        info!(
            target: TARGET,
            event = "market_tracked",
            ticker = %ticker,
            score,
            target_size,
            "market entered"
        );
    }

    pub fn market_untracked(&self, ticker: &Ticker, reason: &str) {
        info!(
            target: TARGET,
            event = "market_untracked",
            ticker = %ticker,
            reason,
            "market dropped"
        );
    }

    pub fn breaker(&self, trading_allowed: bool, consecutive_errors: u32) {
        info!(
            target: TARGET,
            event = "breaker",
            trading_allowed,
            consecutive_errors,
            "breaker status"
        );
    }
}
