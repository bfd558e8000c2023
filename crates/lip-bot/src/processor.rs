//! Per-market processing pipeline.
//!
//! One pass per ticker per orchestrator cycle, short-circuiting: each
//! guard either lets the pass continue or ends it, and every market
//! snapshot (touch, book, position) is fetched once at the top and
//! treated as immutable for the rest of the pass.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lip_core::{Action, Side, Ticker, Touch};
use lip_exchange::TradingApi;
use lip_executor::{Cashout, OrderReconciler, ReconcileInputs};
use lip_mm::gate::{external_touch, ExternalTouch};
use lip_mm::{compute_fair, compute_quotes, ImprovementGate, MakerConfig, QuoteInputs};
use lip_risk::{CircuitBreaker, ToxicityTracker};
use lip_telemetry::TradingEvents;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hours-to-expiry below which no new bids are placed.
const HARD_EXPIRY_HOURS: Decimal = dec!(6);
/// Hours-to-expiry below which bids require spare inventory room.
const SOFT_EXPIRY_HOURS: Decimal = dec!(48);
/// Hours-to-expiry below which any position is flattened at market.
const FLATTEN_HOURS: Decimal = dec!(1);
/// Base edge required over the touch bid before quoting a buy.
const BASE_EDGE: Decimal = dec!(0.01);

/// What one processing pass decided about the market's future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketOutcome {
    pub untrack: bool,
    pub reason: Option<&'static str>,
}

impl MarketOutcome {
    pub fn keep() -> Self {
        Self {
            untrack: false,
            reason: None,
        }
    }

    pub fn untrack(reason: &'static str) -> Self {
        Self {
            untrack: true,
            reason: Some(reason),
        }
    }
}

/// Shared per-market state and the processing pipeline.
pub struct MarketProcessor {
    api: Arc<dyn TradingApi>,
    breaker: Arc<CircuitBreaker>,
    toxicity: Arc<ToxicityTracker>,
    gate: Arc<ImprovementGate>,
    reconciler: OrderReconciler,
    cashout: Cashout,
    events: TradingEvents,
    cfg: MakerConfig,
    /// Liquidity program target size per market.
    targets: Arc<RwLock<HashMap<Ticker, i64>>>,
    /// Known market expiry timestamps, backfilled lazily.
    expiries: Arc<RwLock<HashMap<Ticker, DateTime<Utc>>>>,
    last_touch: Mutex<HashMap<Ticker, Touch>>,
    velocity_cooldown: Mutex<HashMap<Ticker, DateTime<Utc>>>,
}

impl MarketProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn TradingApi>,
        breaker: Arc<CircuitBreaker>,
        toxicity: Arc<ToxicityTracker>,
        gate: Arc<ImprovementGate>,
        cfg: MakerConfig,
        targets: Arc<RwLock<HashMap<Ticker, i64>>>,
        expiries: Arc<RwLock<HashMap<Ticker, DateTime<Utc>>>>,
    ) -> Self {
        let reconciler = OrderReconciler::new(
            Arc::clone(&api),
            Arc::clone(&breaker),
            Arc::clone(&toxicity),
            cfg.clone(),
        );
        let cashout = Cashout::new(Arc::clone(&api), Arc::clone(&breaker));
        Self {
            api,
            breaker,
            toxicity,
            gate,
            reconciler,
            cashout,
            events: TradingEvents,
            cfg,
            targets,
            expiries,
            last_touch: Mutex::new(HashMap::new()),
            velocity_cooldown: Mutex::new(HashMap::new()),
        }
    }

    /// Run one full pass for a market. API failures are contained
    /// here: they feed the breaker and end the pass, never propagate.
    pub async fn process(&self, ticker: &Ticker) -> MarketOutcome {
        let now = Utc::now();

        if self.toxicity.in_cooldown(ticker, now) {
            debug!(ticker = %ticker, "toxicity cooldown active, skipping");
            return MarketOutcome::keep();
        }
        if self.in_velocity_cooldown(ticker, now) {
            debug!(ticker = %ticker, "velocity cooldown active, skipping");
            return MarketOutcome::keep();
        }

        let touch = match self.api.touch(ticker).await {
            Ok(Some(t)) if t.is_valid() => t,
            Ok(_) => {
                debug!(ticker = %ticker, "no usable touch, skipping");
                return MarketOutcome::keep();
            }
            Err(err) => {
                warn!(ticker = %ticker, %err, "touch fetch failed");
                self.breaker.record_error(format!("touch {ticker}: {err}"));
                return MarketOutcome::keep();
            }
        };
        // A stale position reading only makes us quote more timidly.
        let inventory = match self.api.position(ticker).await {
            Ok(contracts) => contracts,
            Err(err) => {
                warn!(ticker = %ticker, %err, "position fetch failed, assuming flat");
                0
            }
        };

        let hours = self.hours_to_expiry(ticker, now).await;
        let hard_expiry = hours.map_or(false, |h| h <= HARD_EXPIRY_HOURS);
        let soft_expiry = hours.map_or(false, |h| h <= SOFT_EXPIRY_HOURS);

        // NO-side quoting is retired; clear any legacy orders on sight.
        if let Err(err) = self
            .reconciler
            .cancel_matching(ticker, |o| o.side == Side::No)
            .await
        {
            self.breaker.record_error(format!("orders {ticker}: {err}"));
            return MarketOutcome::keep();
        }

        if inventory != 0 && hours.map_or(false, |h| h <= FLATTEN_HOURS) {
            info!(ticker = %ticker, inventory, "expiry imminent, flattening at market");
            let _ = self.reconciler.cancel_matching(ticker, |_| true).await;
            self.cashout.flatten(ticker, &touch, inventory).await;
            return MarketOutcome::keep();
        }

        if self.touch_moved_fast(ticker, &touch) {
            info!(ticker = %ticker, "touch moved fast, pulling quotes");
            let _ = self.reconciler.cancel_matching(ticker, |_| true).await;
            self.velocity_cooldown.lock().insert(
                ticker.clone(),
                now + ChronoDuration::seconds(self.cfg.velocity_cooldown_secs as i64),
            );
            return MarketOutcome::keep();
        }

        let book = match self.api.order_book(ticker).await {
            Ok(book) => book,
            Err(err) => {
                warn!(ticker = %ticker, %err, "order book fetch failed");
                self.breaker.record_error(format!("book {ticker}: {err}"));
                return MarketOutcome::keep();
            }
        };
        if book.is_thin(self.cfg.thin_book_floor, self.cfg.thin_book_depth) {
            debug!(ticker = %ticker, "book too thin, skipping");
            return MarketOutcome::keep();
        }

        // Liquidity target already met: extra bids earn no program
        // reward, so stop bidding and leave once flat.
        let target = self.targets.read().get(ticker).copied();
        let mut lip_block = false;
        if let (Some(target), Some((_, best_size))) = (target, book.best_yes_bid()) {
            if target > 0 && best_size >= target {
                let _ = self
                    .reconciler
                    .cancel_matching(ticker, |o| o.action == Action::Buy)
                    .await;
                if inventory == 0 {
                    return MarketOutcome::untrack("liquidity_target_met");
                }
                lip_block = true;
            }
        }

        match self.cashout.check_resolved(ticker, &touch, inventory).await {
            Ok(true) => return MarketOutcome::keep(),
            Ok(false) => {}
            Err(err) => {
                self.breaker.record_error(format!("cashout {ticker}: {err}"));
                return MarketOutcome::keep();
            }
        }

        let orders = match self.api.resting_orders(ticker).await {
            Ok(orders) => orders,
            Err(err) => {
                self.breaker.record_error(format!("orders {ticker}: {err}"));
                return MarketOutcome::keep();
            }
        };
        let external: ExternalTouch = external_touch(&touch, &orders, Side::Yes);
        let allow_improvement = self.gate.evaluate(ticker, Side::Yes, external, now);

        let Some(fair) = compute_fair(&book) else {
            if inventory > 0 {
                // Can't price the market, but a position is open: run
                // an ask-only pass at the touch so it can still exit.
                self.exit_only(ticker, &touch, inventory, hours).await;
            }
            return MarketOutcome::keep();
        };

        let edge_min = BASE_EDGE + self.toxicity.edge_bonus(ticker);
        let min_width = self.cfg.min_quote_width.max(self.toxicity.width_bonus(ticker));

        let mut allow_bid = fair - touch.bid.inner() >= edge_min;
        if hard_expiry || lip_block {
            allow_bid = false;
        } else if soft_expiry && inventory.abs() * 2 >= self.cfg.max_position {
            allow_bid = false;
        }
        let allow_ask = inventory > 0;

        if inventory == 0 && !allow_bid && !allow_ask {
            let _ = self.reconciler.cancel_matching(ticker, |_| true).await;
            if hard_expiry {
                return MarketOutcome::untrack("expiring");
            }
            return MarketOutcome::untrack("no_edge");
        }

        let (bid, ask) = compute_quotes(&QuoteInputs {
            touch: touch.clone(),
            inventory,
            theta: self.cfg.theta,
            allow_improvement,
            min_width,
            lip_block,
        });

        let available_cash = match self.api.balance().await {
            Ok(balance) => balance,
            Err(err) => {
                self.breaker.record_error(format!("balance: {err}"));
                return MarketOutcome::keep();
            }
        };

        let inputs = ReconcileInputs {
            ticker: ticker.clone(),
            side: Side::Yes,
            bid,
            ask,
            spread: touch.spread(),
            inventory,
            allow_bid,
            allow_ask,
            hours_to_expiry: hours,
            available_cash,
        };
        if let Err(err) = self.reconciler.reconcile(&inputs).await {
            self.breaker.record_error(format!("reconcile {ticker}: {err}"));
            return MarketOutcome::keep();
        }

        // The gate is consumed only when the improvement could have
        // run: flat book position and a spread worth improving into.
        let consumed = allow_improvement && inventory == 0 && touch.spread() >= dec!(0.02);
        self.gate.record(ticker, Side::Yes, external, consumed, now);

        if self.toxicity.is_halt_level(ticker) {
            warn!(ticker = %ticker, "markout EMA at halt level, benching market");
            let _ = self.reconciler.cancel_matching(ticker, |_| true).await;
            self.toxicity.start_cooldown(ticker, now);
            self.events.toxicity(
                ticker,
                self.toxicity.ema(ticker).unwrap_or_default(),
                self.toxicity.edge_bonus(ticker),
                self.toxicity.width_bonus(ticker),
            );
            return MarketOutcome::untrack("toxic");
        }

        MarketOutcome::keep()
    }

    /// Ask-only reconcile pass against the market touch.
    async fn exit_only(
        &self,
        ticker: &Ticker,
        touch: &Touch,
        inventory: i64,
        hours: Option<Decimal>,
    ) {
        let inputs = ReconcileInputs {
            ticker: ticker.clone(),
            side: Side::Yes,
            bid: touch.bid,
            ask: touch.ask,
            spread: touch.spread(),
            inventory,
            allow_bid: false,
            allow_ask: true,
            hours_to_expiry: hours,
            available_cash: Decimal::ZERO,
        };
        if let Err(err) = self.reconciler.reconcile(&inputs).await {
            self.breaker.record_error(format!("reconcile {ticker}: {err}"));
        }
    }

    async fn hours_to_expiry(&self, ticker: &Ticker, now: DateTime<Utc>) -> Option<Decimal> {
        let known = self.expiries.read().get(ticker).copied();
        let end = match known {
            Some(end) => Some(end),
            None => match self.api.expiry(ticker).await {
                Ok(Some(end)) => {
                    self.expiries.write().insert(ticker.clone(), end);
                    Some(end)
                }
                Ok(None) => None,
                Err(err) => {
                    debug!(ticker = %ticker, %err, "expiry fetch failed");
                    None
                }
            },
        };
        end.map(|end| Decimal::from((end - now).num_seconds()) / dec!(3600))
    }

    fn in_velocity_cooldown(&self, ticker: &Ticker, now: DateTime<Utc>) -> bool {
        let mut cooldowns = self.velocity_cooldown.lock();
        match cooldowns.get(ticker) {
            Some(until) if *until > now => true,
            Some(_) => {
                cooldowns.remove(ticker);
                false
            }
            None => false,
        }
    }

    /// True when the touch mid moved beyond the fast-move threshold
    /// since the last pass. Always records the current touch.
    fn touch_moved_fast(&self, ticker: &Ticker, touch: &Touch) -> bool {
        let mut seen = self.last_touch.lock();
        let moved = seen
            .get(ticker)
            .map(|prev| (touch.mid() - prev.mid()).abs() > self.cfg.fast_move_threshold)
            .unwrap_or(false);
        seen.insert(ticker.clone(), touch.clone());
        moved
    }

    /// Drop per-market scratch state once a market is untracked.
    pub fn forget(&self, ticker: &Ticker) {
        self.last_touch.lock().remove(ticker);
        self.velocity_cooldown.lock().remove(ticker);
        self.gate.forget(ticker);
    }
}
