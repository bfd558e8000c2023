//! Convergence of resting orders toward the desired quote pair.
//!
//! Invariant: at most one live buy and one live sell per (ticker,
//! side). The reconciler cancels strays, keeps a surviving order that
//! already sits at the target price, and places the missing side.
//! Long inventory runs ask-only: all buys are canceled and the full
//! position is offered at the ask.

use lip_core::{Action, Price, RestingOrder, Side, Ticker};
use lip_exchange::{ApiError, ApiResult, OrderRequest, TradingApi};
use lip_mm::{desired_size, MakerConfig, SizingInputs};
use lip_risk::{CircuitBreaker, ToxicityTracker};
use lip_telemetry::TradingEvents;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct ReconcileInputs {
    pub ticker: Ticker,
    pub side: Side,
    pub bid: Price,
    pub ask: Price,
    pub spread: Decimal,
    pub inventory: i64,
    pub allow_bid: bool,
    pub allow_ask: bool,
    pub hours_to_expiry: Option<Decimal>,
    pub available_cash: Decimal,
}

pub struct OrderReconciler {
    api: Arc<dyn TradingApi>,
    breaker: Arc<CircuitBreaker>,
    toxicity: Arc<ToxicityTracker>,
    events: TradingEvents,
    cfg: MakerConfig,
}

impl OrderReconciler {
    pub fn new(
        api: Arc<dyn TradingApi>,
        breaker: Arc<CircuitBreaker>,
        toxicity: Arc<ToxicityTracker>,
        cfg: MakerConfig,
    ) -> Self {
        Self {
            api,
            breaker,
            toxicity,
            events: TradingEvents,
            cfg,
        }
    }

    /// Converge live orders toward the quote plan. Only the initial
    /// order fetch propagates an error; individual cancel/place
    /// failures are logged and fed to the breaker.
    pub async fn reconcile(&self, inputs: &ReconcileInputs) -> ApiResult<()> {
        let mut allow_bid = inputs.allow_bid;
        let mut allow_ask = inputs.allow_ask;

        let current = self.api.resting_orders(&inputs.ticker).await?;

        let mut buy_size = desired_size(
            &SizingInputs {
                hours_to_expiry: inputs.hours_to_expiry,
                spread: inputs.spread,
                inventory: inputs.inventory,
                side: inputs.side,
                action: Action::Buy,
                price: inputs.bid.inner(),
                available_cash: inputs.available_cash,
            },
            &self.cfg,
        );
        let mut sell_size = inputs.inventory;

        let ema = self.toxicity.ema(&inputs.ticker);
        let params = self.toxicity.params();

        // No markout observation yet: trade tiny until flow quality is known.
        if ema.is_none() {
            let cap = (self.cfg.max_position / 100).max(1);
            buy_size = buy_size.min(cap);
            info!(ticker = %inputs.ticker, buy_size, "first phase, buy size capped");
        }

        if let Some(ema) = ema {
            if ema <= params.bad_threshold {
                let scale = if ema > params.very_bad_threshold() {
                    dec!(0.25)
                } else {
                    Decimal::ZERO
                };
                let old = buy_size;
                buy_size = (Decimal::from(buy_size) * scale)
                    .floor()
                    .to_i64()
                    .unwrap_or(0);
                info!(ticker = %inputs.ticker, ema = %ema, old, new = buy_size, "toxic flow, buy size scaled");
                if ema <= params.very_bad_threshold() {
                    allow_bid = false;
                }
            }
        }

        if buy_size <= 0 {
            allow_bid = false;
        }

        // Above the inventory threshold, stop adding and focus on the exit.
        if inputs.inventory > self.cfg.inventory_buy_threshold() {
            buy_size = 0;
            debug!(
                ticker = %inputs.ticker,
                inventory = inputs.inventory,
                threshold = self.cfg.inventory_buy_threshold(),
                "inventory above buy threshold"
            );
        }

        let buys: Vec<&RestingOrder> = current
            .iter()
            .filter(|o| o.side == inputs.side && o.action == Action::Buy)
            .collect();
        let sells: Vec<&RestingOrder> = current
            .iter()
            .filter(|o| o.side == inputs.side && o.action == Action::Sell)
            .collect();

        let mut keep_buy = false;
        if !allow_bid || inputs.inventory > 0 {
            // Edge gone or already long: no resting buys survive.
            for order in &buys {
                self.cancel(order).await;
            }
            buy_size = 0;
        } else {
            for order in &buys {
                if Price::tick(order.price.inner()) == inputs.bid && !keep_buy {
                    keep_buy = true;
                } else {
                    self.cancel(order).await;
                }
            }
        }

        let mut keep_sell = false;
        if inputs.inventory == 0 && !allow_ask {
            for order in &sells {
                self.cancel(order).await;
            }
            sell_size = 0;
        } else {
            for order in &sells {
                if Price::tick(order.price.inner()) == inputs.ask && !keep_sell {
                    keep_sell = true;
                } else {
                    self.cancel(order).await;
                }
            }
        }

        if !keep_buy && buy_size > 0 {
            self.place(OrderRequest {
                ticker: inputs.ticker.clone(),
                side: inputs.side,
                action: Action::Buy,
                price: inputs.bid,
                count: buy_size,
            })
            .await;
        }

        if inputs.inventory > 0 && !keep_sell && sell_size > 0 {
            self.place(OrderRequest {
                ticker: inputs.ticker.clone(),
                side: inputs.side,
                action: Action::Sell,
                price: inputs.ask,
                count: sell_size,
            })
            .await;
        }

        Ok(())
    }

    /// Cancel every live order matching the predicate. Returns how many
    /// cancels were attempted.
    pub async fn cancel_matching<F>(&self, ticker: &Ticker, pred: F) -> ApiResult<usize>
    where
        F: Fn(&RestingOrder) -> bool + Send,
    {
        let current = self.api.resting_orders(ticker).await?;
        let mut attempted = 0;
        for order in current.iter().filter(|o| pred(o)) {
            self.cancel(order).await;
            attempted += 1;
        }
        Ok(attempted)
    }

    async fn cancel(&self, order: &RestingOrder) {
        match self.api.cancel_order(&order.id).await {
            Ok(()) => {
                info!(
                    ticker = %order.ticker,
                    action = %order.action,
                    price = %order.price,
                    remaining = order.remaining,
                    "order canceled"
                );
                self.breaker.record_success();
            }
            Err(err) => {
                error!(ticker = %order.ticker, order_id = %order.id, %err, "cancel failed");
                self.breaker.record_error(format!("cancel_order: {err}"));
            }
        }
    }

    async fn place(&self, request: OrderRequest) {
        match self.api.place_order(&request).await {
            Ok(id) => {
                debug!(order_id = %id, "placement acknowledged");
                self.events.order_placed(
                    &request.ticker,
                    request.side,
                    request.action,
                    request.price.inner(),
                    request.count,
                );
                self.breaker.record_success();
            }
            // Not an exchange failure: the budget is simply exhausted.
            Err(ApiError::InsufficientBalance) => {
                debug!(
                    ticker = %request.ticker,
                    action = %request.action,
                    "placement skipped, insufficient balance"
                );
            }
            Err(err) => {
                error!(ticker = %request.ticker, action = %request.action, %err, "place failed");
                self.breaker.record_error(format!("place_order: {err}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lip_core::OrderId;
    use lip_exchange::MockTradingApi;
    use lip_risk::{BreakerConfig, ToxicityParams};
    use rust_decimal_macros::dec;

    fn ticker() -> Ticker {
        Ticker::from("TEST-MKT")
    }

    fn resting(id: &str, action: Action, price: Decimal) -> RestingOrder {
        RestingOrder {
            id: OrderId(id.to_string()),
            ticker: ticker(),
            side: Side::Yes,
            action,
            price: Price::new(price),
            remaining: 10,
        }
    }

    fn reconciler(api: Arc<MockTradingApi>) -> OrderReconciler {
        OrderReconciler::new(
            api,
            Arc::new(CircuitBreaker::new(BreakerConfig::default())),
            Arc::new(ToxicityTracker::new(ToxicityParams::default())),
            MakerConfig::default(),
        )
    }

    fn inputs(inventory: i64) -> ReconcileInputs {
        ReconcileInputs {
            ticker: ticker(),
            side: Side::Yes,
            bid: Price::new(dec!(0.40)),
            ask: Price::new(dec!(0.45)),
            spread: dec!(0.05),
            inventory,
            allow_bid: true,
            allow_ask: true,
            hours_to_expiry: None,
            available_cash: dec!(10000),
        }
    }

    #[tokio::test]
    async fn test_duplicates_collapse_to_one_per_side() {
        let api = Arc::new(MockTradingApi::new());
        api.seed_order(resting("b1", Action::Buy, dec!(0.40)));
        api.seed_order(resting("b2", Action::Buy, dec!(0.40)));
        api.seed_order(resting("b3", Action::Buy, dec!(0.38)));
        api.seed_order(resting("s1", Action::Sell, dec!(0.45)));
        api.seed_order(resting("s2", Action::Sell, dec!(0.47)));

        let rec = reconciler(api.clone());
        rec.reconcile(&inputs(0)).await.unwrap();

        let live = api.live_orders();
        let buys: Vec<_> = live.iter().filter(|o| o.action == Action::Buy).collect();
        assert_eq!(buys.len(), 1);
        assert_eq!(buys[0].id.0, "b1");
        // Flat: surviving sell at the ask is kept, stray canceled.
        let sells: Vec<_> = live.iter().filter(|o| o.action == Action::Sell).collect();
        assert_eq!(sells.len(), 1);
        assert_eq!(sells[0].id.0, "s1");
    }

    #[tokio::test]
    async fn test_long_inventory_cancels_all_buys_and_offers_exit() {
        let api = Arc::new(MockTradingApi::new());
        api.seed_order(resting("b1", Action::Buy, dec!(0.40)));
        let rec = reconciler(api.clone());

        rec.reconcile(&inputs(30)).await.unwrap();

        let live = api.live_orders();
        assert!(live.iter().all(|o| o.action != Action::Buy));
        let sells: Vec<_> = live.iter().filter(|o| o.action == Action::Sell).collect();
        assert_eq!(sells.len(), 1);
        assert_eq!(sells[0].price.inner(), dec!(0.45));
        assert_eq!(sells[0].remaining, 30);
    }

    #[tokio::test]
    async fn test_flat_places_first_phase_buy() {
        let api = Arc::new(MockTradingApi::new());
        let rec = reconciler(api.clone());

        rec.reconcile(&inputs(0)).await.unwrap();

        let placed = api.placed_orders();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].action, Action::Buy);
        assert_eq!(placed[0].price.inner(), dec!(0.40));
        // No markout yet: capped at 1% of max_position.
        assert_eq!(placed[0].count, 1);
    }

    #[tokio::test]
    async fn test_keeps_order_already_at_target() {
        let api = Arc::new(MockTradingApi::new());
        api.seed_order(resting("b1", Action::Buy, dec!(0.40)));
        let rec = reconciler(api.clone());

        rec.reconcile(&inputs(0)).await.unwrap();

        assert!(api.placed_orders().is_empty());
        assert!(api.canceled_orders().is_empty());
    }

    #[tokio::test]
    async fn test_blocked_bid_cancels_buys() {
        let api = Arc::new(MockTradingApi::new());
        api.seed_order(resting("b1", Action::Buy, dec!(0.40)));
        let rec = reconciler(api.clone());

        let mut input = inputs(0);
        input.allow_bid = false;
        rec.reconcile(&input).await.unwrap();

        assert!(api.live_orders().is_empty());
        assert!(api.placed_orders().is_empty());
    }

    #[tokio::test]
    async fn test_very_bad_ema_blocks_buying() {
        let api = Arc::new(MockTradingApi::new());
        let toxicity = Arc::new(ToxicityTracker::new(ToxicityParams::default()));
        for _ in 0..10 {
            toxicity.observe(&ticker(), dec!(-0.05));
        }
        let rec = OrderReconciler::new(
            api.clone(),
            Arc::new(CircuitBreaker::new(BreakerConfig::default())),
            toxicity,
            MakerConfig::default(),
        );

        rec.reconcile(&inputs(0)).await.unwrap();
        assert!(api.placed_orders().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_balance_skips_breaker() {
        let api = Arc::new(MockTradingApi::new());
        api.fail_next_place(ApiError::InsufficientBalance);
        let breaker = Arc::new(CircuitBreaker::new(BreakerConfig::default()));
        let rec = OrderReconciler::new(
            api.clone(),
            breaker.clone(),
            Arc::new(ToxicityTracker::new(ToxicityParams::default())),
            MakerConfig::default(),
        );

        rec.reconcile(&inputs(0)).await.unwrap();
        assert_eq!(breaker.status().consecutive_errors, 0);
        assert!(breaker.is_trading_allowed());
    }

    #[tokio::test]
    async fn test_inventory_above_threshold_stops_buys() {
        let api = Arc::new(MockTradingApi::new());
        let rec = reconciler(api.clone());

        // 41 > 40% of 100
        rec.reconcile(&inputs(41)).await.unwrap();

        let placed = api.placed_orders();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].action, Action::Sell);
    }

    #[tokio::test]
    async fn test_cancel_matching_filters() {
        let api = Arc::new(MockTradingApi::new());
        api.seed_order(resting("b1", Action::Buy, dec!(0.40)));
        api.seed_order(resting("s1", Action::Sell, dec!(0.45)));
        let rec = reconciler(api.clone());

        let n = rec
            .cancel_matching(&ticker(), |o| o.action == Action::Buy)
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(api.live_orders().len(), 1);
        assert_eq!(api.live_orders()[0].id.0, "s1");
    }
}
