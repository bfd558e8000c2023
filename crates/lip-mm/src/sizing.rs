//! Order sizing.
//!
//! Size scales with remaining position capacity, market spread, and
//! time to expiry, then gets capped by affordability: only a slice of
//! the unreserved cash balance may be committed to any one market.

use crate::config::MakerConfig;
use lip_core::{Action, Side};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone)]
pub struct SizingInputs {
    pub hours_to_expiry: Option<Decimal>,
    pub spread: Decimal,
    pub inventory: i64,
    pub side: Side,
    pub action: Action,
    pub price: Decimal,
    pub available_cash: Decimal,
}

/// Capital tied up by an order, including fees.
///
/// Buying YES costs the price; buying NO (or selling YES, which posts
/// the opposite collateral) costs the complement.
pub fn order_capital_required(
    side: Side,
    action: Action,
    price: Decimal,
    size: i64,
    fee_per_contract: Decimal,
) -> Decimal {
    let unit = match (action, side) {
        (Action::Buy, Side::Yes) => price,
        (Action::Buy, Side::No) => Decimal::ONE - price,
        (Action::Sell, Side::Yes) => Decimal::ONE - price,
        (Action::Sell, Side::No) => price,
    };
    (unit + fee_per_contract) * Decimal::from(size)
}

/// Largest order the per-market cash budget allows.
pub fn max_affordable_size(
    side: Side,
    action: Action,
    price: Decimal,
    available_cash: Decimal,
    cfg: &MakerConfig,
) -> i64 {
    let spendable = (available_cash * (Decimal::ONE - cfg.reserve_frac)).max(Decimal::ZERO);
    let market_budget = spendable * cfg.per_market_frac;
    let unit = order_capital_required(side, action, price, 1, cfg.fee_per_contract);
    if unit <= Decimal::ZERO {
        return 0;
    }
    (market_budget / unit).floor().to_i64().unwrap_or(0)
}

/// Desired order size in contracts.
///
/// base = max_position * 0.2 * capacity factor * spread factor * time
/// factor, floored at the exchange minimum, then capped by remaining
/// capacity and affordability.
pub fn desired_size(inputs: &SizingInputs, cfg: &MakerConfig) -> i64 {
    let remaining_capacity = (cfg.max_position - inputs.inventory.abs()).max(0);
    if cfg.max_position == 0 {
        return 0;
    }
    let inv_factor = Decimal::from(remaining_capacity) / Decimal::from(cfg.max_position);
    let spread_factor = Decimal::ONE + inputs.spread / dec!(0.02);
    let time_factor = match inputs.hours_to_expiry {
        // Full size far out, fading to nothing inside the 6h cutoff.
        Some(hours) => (hours / dec!(6)).clamp(Decimal::ZERO, Decimal::ONE),
        None => Decimal::ONE,
    };

    let base = (Decimal::from(cfg.max_position) * dec!(0.2) * inv_factor * spread_factor
        * time_factor)
        .floor()
        .to_i64()
        .unwrap_or(0);

    let balance_cap = max_affordable_size(
        inputs.side,
        inputs.action,
        inputs.price,
        inputs.available_cash,
        cfg,
    );

    remaining_capacity
        .min(balance_cap)
        .min(base.max(cfg.min_order_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capital_required_quadrants() {
        let fee = Decimal::ZERO;
        let p = dec!(0.40);
        assert_eq!(order_capital_required(Side::Yes, Action::Buy, p, 1, fee), dec!(0.40));
        assert_eq!(order_capital_required(Side::No, Action::Buy, p, 1, fee), dec!(0.60));
        assert_eq!(order_capital_required(Side::Yes, Action::Sell, p, 1, fee), dec!(0.60));
        assert_eq!(order_capital_required(Side::No, Action::Sell, p, 1, fee), dec!(0.40));
    }

    #[test]
    fn test_capital_includes_fees() {
        let got = order_capital_required(Side::Yes, Action::Buy, dec!(0.40), 10, dec!(0.02));
        assert_eq!(got, dec!(4.20));
    }

    #[test]
    fn test_affordable_size_budget_slice() {
        let cfg = MakerConfig {
            reserve_frac: dec!(0.15),
            per_market_frac: dec!(0.25),
            ..MakerConfig::default()
        };
        // spendable 85, budget 21.25, unit 0.40 -> 53
        let got = max_affordable_size(Side::Yes, Action::Buy, dec!(0.40), dec!(100), &cfg);
        assert_eq!(got, 53);
    }

    #[test]
    fn test_affordable_size_zero_when_reserved() {
        let cfg = MakerConfig::default(); // reserve 0.9, slice 0.25
        let got = max_affordable_size(Side::Yes, Action::Buy, dec!(0.40), dec!(10), &cfg);
        // spendable 1.0, budget 0.25, unit 0.40 -> 0
        assert_eq!(got, 0);
    }

    fn sizing(inventory: i64, hours: Option<Decimal>) -> SizingInputs {
        SizingInputs {
            hours_to_expiry: hours,
            spread: dec!(0.04),
            inventory,
            side: Side::Yes,
            action: Action::Buy,
            price: dec!(0.40),
            available_cash: dec!(10000),
        }
    }

    #[test]
    fn test_desired_size_scales_with_capacity() {
        let cfg = MakerConfig::default(); // max_position 100
        // flat: base = 100 * 0.2 * 1.0 * 3.0 = 60, capped by capacity 100
        assert_eq!(desired_size(&sizing(0, None), &cfg), 60);
        // near the cap: remaining 10 binds
        assert_eq!(desired_size(&sizing(90, None), &cfg), 6);
    }

    #[test]
    fn test_desired_size_fades_into_expiry() {
        let cfg = MakerConfig::default();
        let far = desired_size(&sizing(0, Some(dec!(48))), &cfg);
        let near = desired_size(&sizing(0, Some(dec!(3))), &cfg);
        let at_expiry = desired_size(&sizing(0, Some(Decimal::ZERO)), &cfg);
        assert_eq!(far, 60);
        assert_eq!(near, 30);
        // base 0 floors at min_order_size, capacity allows it
        assert_eq!(at_expiry, 1);
    }

    #[test]
    fn test_desired_size_respects_remaining_capacity() {
        let cfg = MakerConfig::default();
        assert_eq!(desired_size(&sizing(100, None), &cfg), 0);
    }
}
