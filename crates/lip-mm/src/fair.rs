//! Fair value from the order book.

use lip_core::{OrderBook, Price};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Blend of mid and size-weighted microprice at the YES touch:
/// fair = 0.35 * mid + 0.65 * micro.
///
/// Sizes are aggregated across levels tied at the best price. Returns
/// `None` when either YES-equivalent side is empty; the caller decides
/// whether to stand down or run exit-only.
pub fn compute_fair(book: &OrderBook) -> Option<Decimal> {
    let yes_bids: Vec<(Price, i64)> = book
        .yes
        .iter()
        .map(|&(p, sz)| (Price::tick(p.inner()), sz))
        .collect();
    let yes_asks: Vec<(Price, i64)> = book
        .no
        .iter()
        .map(|&(p, sz)| (p.complement(), sz))
        .collect();

    let best_bid = yes_bids.iter().map(|(p, _)| *p).max()?;
    let best_ask = yes_asks.iter().map(|(p, _)| *p).min()?;

    let bid_sz: i64 = yes_bids
        .iter()
        .filter(|(p, _)| *p == best_bid)
        .map(|(_, sz)| *sz)
        .sum();
    let ask_sz: i64 = yes_asks
        .iter()
        .filter(|(p, _)| *p == best_ask)
        .map(|(_, sz)| *sz)
        .sum();

    let mid = Price::tick((best_bid.inner() + best_ask.inner()) / Decimal::TWO).inner();
    let total = Decimal::from(bid_sz + ask_sz);
    let micro = if total > Decimal::ZERO {
        Price::tick(
            (best_ask.inner() * Decimal::from(bid_sz) + best_bid.inner() * Decimal::from(ask_sz))
                / total,
        )
        .inner()
    } else {
        mid
    };

    Some(mid * dec!(0.35) + micro * dec!(0.65))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(p: Decimal, sz: i64) -> (Price, i64) {
        (Price::new(p), sz)
    }

    #[test]
    fn test_balanced_book_fair_is_mid() {
        let book = OrderBook {
            yes: vec![level(dec!(0.40), 100)],
            no: vec![level(dec!(0.56), 100)],
        };
        // touch 0.40 / 0.44, equal sizes: micro == mid == 0.42
        assert_eq!(compute_fair(&book), Some(dec!(0.42)));
    }

    #[test]
    fn test_microprice_leans_toward_heavy_side() {
        let book = OrderBook {
            yes: vec![level(dec!(0.40), 300)],
            no: vec![level(dec!(0.50), 100)],
        };
        // touch 0.40 / 0.50; micro = (0.50*300 + 0.40*100) / 400 = 0.475 -> 0.48
        // fair = 0.45 * 0.35 + 0.48 * 0.65
        let fair = compute_fair(&book).unwrap();
        assert_eq!(fair, dec!(0.45) * dec!(0.35) + dec!(0.48) * dec!(0.65));
        assert!(fair > dec!(0.45));
    }

    #[test]
    fn test_empty_side_yields_none() {
        let one_sided = OrderBook {
            yes: vec![level(dec!(0.40), 100)],
            no: vec![],
        };
        assert_eq!(compute_fair(&one_sided), None);
        assert_eq!(compute_fair(&OrderBook::default()), None);
    }

    #[test]
    fn test_ties_at_best_aggregate_size() {
        let book = OrderBook {
            yes: vec![level(dec!(0.40), 100), level(dec!(0.40), 200)],
            no: vec![level(dec!(0.56), 100)],
        };
        // bid_sz 300 at 0.40; micro = (0.44*300 + 0.40*100)/400 = 0.43
        let fair = compute_fair(&book).unwrap();
        assert_eq!(fair, dec!(0.42) * dec!(0.35) + dec!(0.43) * dec!(0.65));
    }
}
