//! Bid/ask computation.
//!
//! Quotes anchor at the touch, then apply inventory skew, minimum
//! width, and the one-tick improvement rules. Long inventory keeps the
//! ask pinned at the touch so the position exits quickly.

use lip_core::{Price, Touch};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const BID_FLOOR: Decimal = dec!(0.02);
const ASK_CEIL: Decimal = dec!(0.98);
const TICK: Decimal = dec!(0.01);

#[derive(Debug, Clone)]
pub struct QuoteInputs {
    pub touch: Touch,
    /// Signed YES-equivalent contracts.
    pub inventory: i64,
    /// Skew factor per contract of inventory.
    pub theta: Decimal,
    /// Gate decision: may we improve the touch by one tick?
    pub allow_improvement: bool,
    /// Minimum quote width including any toxicity width bonus.
    pub min_width: Decimal,
    /// Liquidity target already met: freeze the bid at the touch.
    pub lip_block: bool,
}

/// Compute the (bid, ask) quote pair.
pub fn compute_quotes(inputs: &QuoteInputs) -> (Price, Price) {
    let touch_bid = inputs.touch.bid.inner();
    let touch_ask = inputs.touch.ask.inner();
    let spread = (touch_ask - touch_bid).max(Decimal::ZERO);

    // Target met: leave the touch untouched, long or flat.
    if inputs.lip_block {
        return (inputs.touch.bid, inputs.touch.ask);
    }

    let skew = inputs.theta * Decimal::from(inputs.inventory) * spread.max(TICK);

    let mut bid = Price::tick((touch_bid - skew).max(BID_FLOOR)).inner();
    // Skew the ask up only when not long; a long position exits at the touch.
    let mut ask = if inputs.inventory <= 0 {
        Price::tick((touch_ask + skew).min(ASK_CEIL)).inner()
    } else {
        touch_ask
    };

    let want_width = inputs.min_width.max(Decimal::ZERO);
    (bid, ask) = enforce_width(bid, ask, want_width);

    if spread < dec!(0.03) {
        // Too tight to quote inside: back off a tick.
        bid = Price::tick((bid - TICK).max(BID_FLOOR)).inner();
        if inputs.inventory <= 0 {
            ask = Price::tick((ask + TICK).min(ASK_CEIL)).inner();
        }
    } else if inputs.allow_improvement && spread >= dec!(0.04) {
        bid = Price::tick(bid + TICK)
            .inner()
            .min(Price::tick(ask - TICK).inner());
        if inputs.inventory == 0 {
            ask = Price::tick(ask - TICK)
                .inner()
                .max(Price::tick(bid + TICK).inner());
        } else {
            ask = Price::tick(touch_ask).inner();
        }
    }

    (bid, ask) = enforce_width(bid, ask, want_width);
    (Price::new(bid), Price::new(ask))
}

/// Widen symmetrically around the current quote mid to meet `want_width`.
fn enforce_width(bid: Decimal, ask: Decimal, want_width: Decimal) -> (Decimal, Decimal) {
    if ask - bid >= want_width {
        return (bid, ask);
    }
    let mid = (bid + ask) / Decimal::TWO;
    let half = want_width / Decimal::TWO;
    (
        Price::tick((mid - half).max(BID_FLOOR)).inner(),
        Price::tick((mid + half).min(ASK_CEIL)).inner(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(bid: Decimal, ask: Decimal) -> Touch {
        Touch::new(Price::new(bid), Price::new(ask))
    }

    fn inputs(touch_: Touch, inventory: i64) -> QuoteInputs {
        QuoteInputs {
            touch: touch_,
            inventory,
            theta: dec!(0.005),
            allow_improvement: true,
            min_width: Decimal::ZERO,
            lip_block: false,
        }
    }

    #[test]
    fn test_flat_wide_spread_improves_both_sides() {
        let (bid, ask) = compute_quotes(&inputs(touch(dec!(0.40), dec!(0.45)), 0));
        assert_eq!(bid.inner(), dec!(0.41));
        assert_eq!(ask.inner(), dec!(0.44));
        assert!(bid.inner() < ask.inner());
    }

    #[test]
    fn test_quotes_stay_near_touch() {
        let (bid, ask) = compute_quotes(&inputs(touch(dec!(0.40), dec!(0.45)), 0));
        assert!(bid.inner() >= dec!(0.39));
        assert!(ask.inner() <= dec!(0.46));
    }

    #[test]
    fn test_long_inventory_pins_ask_at_touch() {
        let (bid, ask) = compute_quotes(&inputs(touch(dec!(0.40), dec!(0.45)), 40));
        assert_eq!(ask.inner(), dec!(0.45));
        // Skew pushes the bid down: 0.005 * 40 * 0.05 = 0.01
        assert!(bid.inner() < dec!(0.41));
    }

    #[test]
    fn test_short_inventory_skews_ask_up() {
        let mut input = inputs(touch(dec!(0.40), dec!(0.45)), -40);
        input.allow_improvement = false;
        let (bid, ask) = compute_quotes(&input);
        // skew = 0.005 * -40 * 0.05 = -0.01: bid lifts, ask lifts
        assert_eq!(bid.inner(), dec!(0.41));
        assert_eq!(ask.inner(), dec!(0.44));
    }

    #[test]
    fn test_lip_block_freezes_at_touch() {
        let mut input = inputs(touch(dec!(0.40), dec!(0.45)), 30);
        input.lip_block = true;
        let (bid, ask) = compute_quotes(&input);
        assert_eq!(bid.inner(), dec!(0.40));
        assert_eq!(ask.inner(), dec!(0.45));
    }

    #[test]
    fn test_tight_spread_backs_off_one_tick() {
        let (bid, ask) = compute_quotes(&inputs(touch(dec!(0.49), dec!(0.51)), 0));
        assert_eq!(bid.inner(), dec!(0.48));
        assert_eq!(ask.inner(), dec!(0.52));
    }

    #[test]
    fn test_tight_spread_long_keeps_ask() {
        let (bid, ask) = compute_quotes(&inputs(touch(dec!(0.49), dec!(0.51)), 10));
        assert_eq!(bid.inner(), dec!(0.48));
        assert_eq!(ask.inner(), dec!(0.51));
    }

    #[test]
    fn test_min_width_widens_symmetrically() {
        let mut input = inputs(touch(dec!(0.44), dec!(0.48)), 0);
        input.allow_improvement = false;
        input.min_width = dec!(0.06);
        let (bid, ask) = compute_quotes(&input);
        assert_eq!(bid.inner(), dec!(0.43));
        assert_eq!(ask.inner(), dec!(0.49));
    }

    #[test]
    fn test_no_improvement_when_gated() {
        let mut input = inputs(touch(dec!(0.40), dec!(0.45)), 0);
        input.allow_improvement = false;
        let (bid, ask) = compute_quotes(&input);
        assert_eq!(bid.inner(), dec!(0.40));
        assert_eq!(ask.inner(), dec!(0.45));
    }

    #[test]
    fn test_bid_floor_respected() {
        let (bid, _) = compute_quotes(&inputs(touch(dec!(0.02), dec!(0.08)), 90));
        assert!(bid.inner() >= dec!(0.02));
    }
}
