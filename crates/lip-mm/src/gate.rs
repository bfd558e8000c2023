//! One-tick improvement gating.
//!
//! Improving the touch repeatedly against ourselves walks the quote
//! away from fair. The gate allows one improvement per external touch:
//! our own best orders are masked out of the observed touch, and only
//! a change in what remains re-arms the gate. An optional cooldown
//! adds a minimum wait between improvements.

use chrono::{DateTime, Duration, Utc};
use lip_core::{Action, Price, RestingOrder, Side, Ticker, Touch};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Market touch with our own orders at the top masked to `None`.
pub type ExternalTouch = (Option<Price>, Option<Price>);

/// Mask our best resting buy/sell out of the market touch.
pub fn external_touch(touch: &Touch, our_orders: &[RestingOrder], side: Side) -> ExternalTouch {
    let mut our_best_buy: Option<Price> = None;
    let mut our_best_sell: Option<Price> = None;
    for order in our_orders.iter().filter(|o| o.side == side) {
        let price = Price::tick(order.price.inner());
        match order.action {
            Action::Buy => {
                our_best_buy = Some(our_best_buy.map_or(price, |p| p.max(price)));
            }
            Action::Sell => {
                our_best_sell = Some(our_best_sell.map_or(price, |p| p.min(price)));
            }
        }
    }

    let bid = Price::tick(touch.bid.inner());
    let ask = Price::tick(touch.ask.inner());
    let ext_bid = match our_best_buy {
        Some(ours) if ours == bid => None,
        _ => Some(bid),
    };
    let ext_ask = match our_best_sell {
        Some(ours) if ours == ask => None,
        _ => Some(ask),
    };
    (ext_bid, ext_ask)
}

#[derive(Debug, Default, Clone)]
struct GateState {
    last_external: Option<ExternalTouch>,
    improved: bool,
    last_improve_at: Option<DateTime<Utc>>,
}

/// Per-(ticker, side) improvement permission.
pub struct ImprovementGate {
    improve_once_per_touch: bool,
    cooldown: Duration,
    state: Mutex<HashMap<(Ticker, Side), GateState>>,
}

impl ImprovementGate {
    pub fn new(improve_once_per_touch: bool, cooldown_secs: u64) -> Self {
        Self {
            improve_once_per_touch,
            cooldown: Duration::seconds(cooldown_secs as i64),
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Decide whether improvement is allowed right now, re-arming the
    /// gate first if the external touch moved.
    pub fn evaluate(
        &self,
        ticker: &Ticker,
        side: Side,
        external: ExternalTouch,
        now: DateTime<Utc>,
    ) -> bool {
        let mut state = self.state.lock();
        let gate = state.entry((ticker.clone(), side)).or_default();

        if gate.last_external.as_ref() != Some(&external) {
            gate.improved = false;
        }
        if !self.improve_once_per_touch {
            return true;
        }
        let cooldown_ok = self.cooldown <= Duration::zero()
            || gate
                .last_improve_at
                .map(|at| now - at >= self.cooldown)
                .unwrap_or(true);
        !gate.improved && cooldown_ok
    }

    /// Record the observed external touch after a quoting pass, marking
    /// the gate consumed when the improvement actually ran.
    pub fn record(
        &self,
        ticker: &Ticker,
        side: Side,
        external: ExternalTouch,
        consumed: bool,
        now: DateTime<Utc>,
    ) {
        let mut state = self.state.lock();
        let gate = state.entry((ticker.clone(), side)).or_default();
        gate.last_external = Some(external);
        if consumed {
            gate.improved = true;
            gate.last_improve_at = Some(now);
        }
    }

    /// Seed gate state when a market is first tracked (discovery).
    pub fn seed(&self, ticker: &Ticker, side: Side, touch: &Touch) {
        let mut state = self.state.lock();
        state.entry((ticker.clone(), side)).or_insert(GateState {
            last_external: Some((
                Some(Price::tick(touch.bid.inner())),
                Some(Price::tick(touch.ask.inner())),
            )),
            improved: false,
            last_improve_at: None,
        });
    }

    pub fn forget(&self, ticker: &Ticker) {
        self.state.lock().retain(|(t, _), _| t != ticker);
    }
}
