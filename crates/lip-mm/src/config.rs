//! Maker parameters.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// Quote and sizing parameters for one maker instance.
#[derive(Debug, Clone, Deserialize)]
pub struct MakerConfig {
    /// Position cap in contracts per market.
    #[serde(default = "default_max_position")]
    pub max_position: i64,
    /// Inventory skew per contract, in dollars per unit of spread.
    #[serde(default = "default_theta")]
    pub theta: Decimal,
    /// Minimum quote width in dollars (0 disables).
    #[serde(default = "default_min_quote_width")]
    pub min_quote_width: Decimal,
    /// Allow one-tick improvement only once per external touch.
    #[serde(default = "default_improve_once_per_touch")]
    pub improve_once_per_touch: bool,
    /// Extra wait between improvements in seconds (0 disables).
    #[serde(default)]
    pub improve_cooldown_secs: u64,
    /// Exchange minimum order size in contracts.
    #[serde(default = "default_min_order_size")]
    pub min_order_size: i64,
    /// Fraction of the cash balance kept in reserve.
    #[serde(default = "default_reserve_frac")]
    pub reserve_frac: Decimal,
    /// Fraction of spendable cash allotted to any single market.
    #[serde(default = "default_per_market_frac")]
    pub per_market_frac: Decimal,
    /// Exchange fee per contract in dollars.
    #[serde(default)]
    pub fee_per_contract: Decimal,
    /// Stop buying above this fraction of max_position.
    #[serde(default = "default_inventory_buy_threshold_frac")]
    pub inventory_buy_threshold_frac: Decimal,
    /// Aggregate depth floor for the thin-book check, in contracts.
    #[serde(default = "default_thin_book_floor")]
    pub thin_book_floor: i64,
    /// Levels per side counted by the thin-book check.
    #[serde(default = "default_thin_book_depth")]
    pub thin_book_depth: usize,
    /// One-cycle touch move that triggers the velocity cooldown.
    #[serde(default = "default_fast_move_threshold")]
    pub fast_move_threshold: Decimal,
    /// Velocity cooldown length in seconds.
    #[serde(default = "default_velocity_cooldown_secs")]
    pub velocity_cooldown_secs: u64,
}

fn default_max_position() -> i64 {
    100
}

fn default_theta() -> Decimal {
    dec!(0.005)
}

fn default_min_quote_width() -> Decimal {
    Decimal::ZERO
}

fn default_improve_once_per_touch() -> bool {
    true
}

fn default_min_order_size() -> i64 {
    1
}

fn default_reserve_frac() -> Decimal {
    dec!(0.9)
}

fn default_per_market_frac() -> Decimal {
    dec!(0.25)
}

fn default_inventory_buy_threshold_frac() -> Decimal {
    dec!(0.4)
}

fn default_thin_book_floor() -> i64 {
    200
}

fn default_thin_book_depth() -> usize {
    2
}

fn default_fast_move_threshold() -> Decimal {
    dec!(0.01)
}

fn default_velocity_cooldown_secs() -> u64 {
    15
}

impl Default for MakerConfig {
    fn default() -> Self {
        Self {
            max_position: default_max_position(),
            theta: default_theta(),
            min_quote_width: default_min_quote_width(),
            improve_once_per_touch: default_improve_once_per_touch(),
            improve_cooldown_secs: 0,
            min_order_size: default_min_order_size(),
            reserve_frac: default_reserve_frac(),
            per_market_frac: default_per_market_frac(),
            fee_per_contract: Decimal::ZERO,
            inventory_buy_threshold_frac: default_inventory_buy_threshold_frac(),
            thin_book_floor: default_thin_book_floor(),
            thin_book_depth: default_thin_book_depth(),
            fast_move_threshold: default_fast_move_threshold(),
            velocity_cooldown_secs: default_velocity_cooldown_secs(),
        }
    }
}

impl MakerConfig {
    /// Contracts above which new buying stops.
    pub fn inventory_buy_threshold(&self) -> i64 {
        (Decimal::from(self.max_position) * self.inventory_buy_threshold_frac)
            .trunc()
            .to_i64()
            .unwrap_or(0)
    }
}
