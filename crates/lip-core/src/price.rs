//! Precision-safe price type for binary contracts.
//!
//! Uses `rust_decimal` for exact decimal arithmetic, avoiding
//! floating-point rounding errors critical in financial calculations.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Price of a binary contract in dollars, quantized to one-cent ticks.
///
/// Wraps `Decimal` to provide type safety. Exchange prices live on the
/// open interval (0, 1); every constructor that takes raw input clamps
/// into [MIN, MAX].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    /// Lowest quotable price.
    pub const MIN: Self = Self(dec!(0.01));
    /// Highest quotable price.
    pub const MAX: Self = Self(dec!(0.99));
    pub const ZERO: Self = Self(Decimal::ZERO);
    pub const ONE: Self = Self(Decimal::ONE);

    /// Quantize a raw value to the nearest cent (half up) and clamp
    /// into the quotable range. Idempotent: `tick(tick(x)) == tick(x)`.
    #[inline]
    pub fn tick(value: Decimal) -> Self {
        let quantized =
            value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Self(quantized.clamp(Self::MIN.0, Self::MAX.0))
    }

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Integer cents in 1..=99 for a ticked price.
    #[inline]
    pub fn cents(&self) -> i64 {
        (Self::tick(self.0).0 * dec!(100)).to_i64().unwrap_or(0)
    }

    /// Price of the opposite outcome: 1 - p, re-ticked.
    #[inline]
    pub fn complement(&self) -> Self {
        Self::tick(Decimal::ONE - self.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tick_rounds_half_up() {
        assert_eq!(Price::tick(dec!(0.234)).inner(), dec!(0.23));
        assert_eq!(Price::tick(dec!(0.235)).inner(), dec!(0.24));
    }

    #[test]
    fn test_tick_clamps_to_quotable_range() {
        assert_eq!(Price::tick(dec!(0.004)), Price::MIN);
        assert_eq!(Price::tick(dec!(0.995)), Price::MAX);
        assert_eq!(Price::tick(dec!(-3)), Price::MIN);
        assert_eq!(Price::tick(dec!(7)), Price::MAX);
    }

    #[test]
    fn test_tick_is_idempotent() {
        for raw in [dec!(0.004), dec!(0.235), dec!(0.5), dec!(0.995), dec!(1.2)] {
            let once = Price::tick(raw);
            assert_eq!(Price::tick(once.inner()), once);
        }
    }

    #[test]
    fn test_cents() {
        assert_eq!(Price::new(dec!(0.999)).cents(), 99);
        assert_eq!(Price::new(dec!(0.0001)).cents(), 1);
        assert_eq!(Price::new(dec!(0.40)).cents(), 40);
    }

    #[test]
    fn test_complement() {
        assert_eq!(Price::new(dec!(0.40)).complement().inner(), dec!(0.60));
        assert_eq!(Price::new(dec!(0.99)).complement(), Price::MIN);
    }
}
