//! Markout measurement and toxicity state.
//!
//! A fill's markout is the signed YES-mid move against the entry price
//! a few seconds after the trade: negative means we were picked off.
//! Each fill schedules one checkpoint per horizon; the orchestrator
//! drains due checkpoints, supplies the current mid, and feeds the
//! per-market EMA here.

use chrono::{DateTime, Duration, Utc};
use lip_core::{Action, Fill, Side, Ticker};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Horizon {
    Short,
    Long,
}

impl std::fmt::Display for Horizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Short => write!(f, "short"),
            Self::Long => write!(f, "long"),
        }
    }
}

/// A pending post-fill checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkoutCheck {
    pub ticker: Ticker,
    /// +1 for YES-equivalent buys, -1 for sells.
    pub direction: i8,
    /// YES-space entry price in dollars.
    pub entry_price: Decimal,
    pub horizon: Horizon,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ToxicityParams {
    pub short_horizon: Duration,
    pub long_horizon: Duration,
    /// EMA smoothing factor.
    pub alpha: Decimal,
    /// EMA at or below this is adverse flow (dollars, negative).
    pub bad_threshold: Decimal,
    /// Extra required edge once flow turns bad.
    pub edge_bump: Decimal,
    /// Extra minimum width once flow turns bad.
    pub width_bump: Decimal,
    /// Bench period after a very-bad reading.
    pub cooldown: Duration,
}

impl Default for ToxicityParams {
    fn default() -> Self {
        Self {
            short_horizon: Duration::seconds(5),
            long_horizon: Duration::seconds(30),
            alpha: dec!(0.4),
            bad_threshold: dec!(-0.003),
            edge_bump: dec!(0.002),
            width_bump: dec!(0.01),
            cooldown: Duration::seconds(1800),
        }
    }
}

impl ToxicityParams {
    /// EMA level that zeroes buying and blocks re-discovery.
    pub fn very_bad_threshold(&self) -> Decimal {
        self.bad_threshold * dec!(3)
    }

    /// EMA level that benches the market entirely.
    pub fn halt_threshold(&self) -> Decimal {
        self.bad_threshold * dec!(5)
    }
}

/// Bounded queue of pending markout checkpoints.
///
/// Checkpoints whose mid is unavailable at drain time are requeued and
/// retried on the next drain.
pub struct MarkoutQueue {
    checks: Mutex<VecDeque<MarkoutCheck>>,
    capacity: usize,
}

impl MarkoutQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            checks: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Schedule short and long checkpoints for one fill. The oldest
    /// pending checkpoints are dropped beyond capacity.
    pub fn enqueue_fill(&self, fill: &Fill, params: &ToxicityParams, now: DateTime<Utc>) {
        // YES price is already reported in YES space; NO side only
        // flips the direction.
        let action = match fill.side {
            Side::Yes => fill.action,
            Side::No => fill.action.opposite(),
        };
        let direction: i8 = match action {
            Action::Buy => 1,
            Action::Sell => -1,
        };

        let mut checks = self.checks.lock();
        for (horizon, delay) in [
            (Horizon::Short, params.short_horizon),
            (Horizon::Long, params.long_horizon),
        ] {
            checks.push_back(MarkoutCheck {
                ticker: fill.ticker.clone(),
                direction,
                entry_price: fill.yes_price.inner(),
                horizon,
                due_at: now + delay,
            });
        }
        while checks.len() > self.capacity {
            checks.pop_front();
        }
        debug!(ticker = %fill.ticker, pending = checks.len(), "markout checkpoints enqueued");
    }

    /// Remove and return every checkpoint due at `now`.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<MarkoutCheck> {
        let mut checks = self.checks.lock();
        let mut due = Vec::new();
        let mut pending = VecDeque::with_capacity(checks.len());
        for check in checks.drain(..) {
            if check.due_at <= now {
                due.push(check);
            } else {
                pending.push_back(check);
            }
        }
        *checks = pending;
        due
    }

    /// Put a checkpoint back for the next drain (mid unavailable).
    pub fn requeue(&self, check: MarkoutCheck) {
        self.checks.lock().push_front(check);
    }

    pub fn len(&self) -> usize {
        self.checks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.lock().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct MarketToxicity {
    ema: Option<Decimal>,
    edge_bonus: Decimal,
    width_bonus: Decimal,
    benched_until: Option<DateTime<Utc>>,
}

/// Per-market adverse-selection state.
pub struct ToxicityTracker {
    params: ToxicityParams,
    markets: Mutex<HashMap<Ticker, MarketToxicity>>,
}

impl ToxicityTracker {
    pub fn new(params: ToxicityParams) -> Self {
        Self {
            params,
            markets: Mutex::new(HashMap::new()),
        }
    }

    pub fn params(&self) -> &ToxicityParams {
        &self.params
    }

    /// Fold one realized markout observation into the market's EMA and
    /// adjust the edge/width bonuses: jump to the floor on a bad EMA,
    /// otherwise decay toward zero. Returns the updated EMA.
    pub fn observe(&self, ticker: &Ticker, markout: Decimal) -> Decimal {
        let mut markets = self.markets.lock();
        let state = markets.entry(ticker.clone()).or_default();

        let prev = state.ema.unwrap_or(Decimal::ZERO);
        let ema = self.params.alpha * markout + (Decimal::ONE - self.params.alpha) * prev;
        state.ema = Some(ema);

        if ema <= self.params.bad_threshold {
            state.edge_bonus = state.edge_bonus.max(self.params.edge_bump);
            state.width_bonus = state.width_bonus.max(self.params.width_bump);
            info!(ticker = %ticker, ema = %ema, "adverse flow, edge and width bumped");
        } else {
            state.edge_bonus = (state.edge_bonus * dec!(0.5)).max(Decimal::ZERO);
            state.width_bonus = (state.width_bonus * dec!(0.5)).max(Decimal::ZERO);
        }
        ema
    }

    /// Compute and fold in the markout for a due checkpoint.
    pub fn observe_check(&self, check: &MarkoutCheck, mid: Decimal) -> Decimal {
        let markout = Decimal::from(check.direction) * (mid - check.entry_price);
        self.observe(&check.ticker, markout)
    }

    /// `None` until the first markout observation lands.
    pub fn ema(&self, ticker: &Ticker) -> Option<Decimal> {
        self.markets.lock().get(ticker).and_then(|s| s.ema)
    }

    pub fn edge_bonus(&self, ticker: &Ticker) -> Decimal {
        self.markets
            .lock()
            .get(ticker)
            .map(|s| s.edge_bonus)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn width_bonus(&self, ticker: &Ticker) -> Decimal {
        self.markets
            .lock()
            .get(ticker)
            .map(|s| s.width_bonus)
            .unwrap_or(Decimal::ZERO)
    }

    /// EMA at or below the halt threshold.
    pub fn is_halt_level(&self, ticker: &Ticker) -> bool {
        self.ema(ticker)
            .map(|ema| ema <= self.params.halt_threshold())
            .unwrap_or(false)
    }

    /// EMA at or below the very-bad threshold (blocks discovery too).
    pub fn is_very_bad(&self, ticker: &Ticker) -> bool {
        self.ema(ticker)
            .map(|ema| ema <= self.params.very_bad_threshold())
            .unwrap_or(false)
    }

    /// Bench the market for the configured cooldown.
    pub fn start_cooldown(&self, ticker: &Ticker, now: DateTime<Utc>) {
        let until = now + self.params.cooldown;
        self.markets
            .lock()
            .entry(ticker.clone())
            .or_default()
            .benched_until = Some(until);
        info!(ticker = %ticker, until = %until, "toxicity cooldown started");
    }

    pub fn in_cooldown(&self, ticker: &Ticker, now: DateTime<Utc>) -> bool {
        self.markets
            .lock()
            .get(ticker)
            .and_then(|s| s.benched_until)
            .map(|until| now < until)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lip_core::Price;

    fn ticker() -> Ticker {
        Ticker::from("TEST-MKT")
    }

    fn fill(now: DateTime<Utc>) -> Fill {
        Fill {
            ticker: ticker(),
            side: Side::Yes,
            action: Action::Buy,
            count: 10,
            yes_price: Price::new(dec!(0.40)),
            ts: now,
        }
    }

    #[test]
    fn test_enqueue_schedules_both_horizons() {
        let queue = MarkoutQueue::new(2000);
        let params = ToxicityParams::default();
        let now = Utc::now();
        queue.enqueue_fill(&fill(now), &params, now);

        assert_eq!(queue.len(), 2);
        assert!(queue.take_due(now).is_empty());

        let due = queue.take_due(now + Duration::seconds(6));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].horizon, Horizon::Short);
        assert_eq!(due[0].direction, 1);

        let due = queue.take_due(now + Duration::seconds(31));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].horizon, Horizon::Long);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_requeue_retries_next_drain() {
        let queue = MarkoutQueue::new(2000);
        let params = ToxicityParams::default();
        let now = Utc::now();
        queue.enqueue_fill(&fill(now), &params, now);

        let later = now + Duration::seconds(6);
        let due = queue.take_due(later);
        assert_eq!(due.len(), 1);
        queue.requeue(due.into_iter().next().unwrap());

        // Still due on the next drain.
        assert_eq!(queue.take_due(later).len(), 1);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let queue = MarkoutQueue::new(4);
        let params = ToxicityParams::default();
        let now = Utc::now();
        for _ in 0..5 {
            queue.enqueue_fill(&fill(now), &params, now);
        }
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_bad_ema_bumps_then_decays() {
        let tracker = ToxicityTracker::new(ToxicityParams::default());
        let t = ticker();

        assert_eq!(tracker.ema(&t), None);
        // alpha=0.4 over a -0.02 markout: ema = -0.008 <= -0.003
        tracker.observe(&t, dec!(-0.02));
        assert_eq!(tracker.edge_bonus(&t), dec!(0.002));
        assert_eq!(tracker.width_bonus(&t), dec!(0.01));

        // A strong positive markout lifts the EMA, bonuses halve.
        tracker.observe(&t, dec!(0.03));
        assert!(tracker.ema(&t).unwrap() > dec!(-0.003));
        assert_eq!(tracker.edge_bonus(&t), dec!(0.001));
        assert_eq!(tracker.width_bonus(&t), dec!(0.005));
    }

    #[test]
    fn test_severity_thresholds() {
        let tracker = ToxicityTracker::new(ToxicityParams::default());
        let t = ticker();

        // Repeated terrible markouts drive the EMA past -0.015.
        for _ in 0..10 {
            tracker.observe(&t, dec!(-0.05));
        }
        assert!(tracker.is_very_bad(&t));
        assert!(tracker.is_halt_level(&t));

        let clean = Ticker::from("CLEAN-MKT");
        assert!(!tracker.is_very_bad(&clean));
        assert!(!tracker.is_halt_level(&clean));
    }

    #[test]
    fn test_observe_check_sign() {
        let tracker = ToxicityTracker::new(ToxicityParams::default());
        let check = MarkoutCheck {
            ticker: ticker(),
            direction: -1,
            entry_price: dec!(0.45),
            horizon: Horizon::Short,
            due_at: Utc::now(),
        };
        // Sold at 0.45, mid dropped to 0.40: good markout for a sale.
        let ema = tracker.observe_check(&check, dec!(0.40));
        assert_eq!(ema, dec!(0.02));
    }

    #[test]
    fn test_cooldown_window() {
        let tracker = ToxicityTracker::new(ToxicityParams::default());
        let t = ticker();
        let now = Utc::now();

        assert!(!tracker.in_cooldown(&t, now));
        tracker.start_cooldown(&t, now);
        assert!(tracker.in_cooldown(&t, now + Duration::seconds(1799)));
        assert!(!tracker.in_cooldown(&t, now + Duration::seconds(1801)));
    }
}
