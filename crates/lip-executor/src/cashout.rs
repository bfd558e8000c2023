//! Resolved-market detection and position flattening.
//!
//! A market whose YES mid pins near 0 or 1 has effectively resolved;
//! quoting it is pointless and holding through settlement ties up
//! capital. The same flattening path serves markets inside the final
//! hour before expiry.

use lip_core::{Action, Side, Ticker, Touch};
use lip_exchange::{ApiError, ApiResult, OrderRequest, TradingApi};
use lip_risk::CircuitBreaker;
use lip_telemetry::TradingEvents;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{info, warn};

const RESOLVED_HIGH: Decimal = dec!(0.95);
const RESOLVED_LOW: Decimal = dec!(0.05);

/// Classify a YES mid as resolved: >= 0.95 is YES, <= 0.05 is NO.
pub fn resolved_side(yes_mid: Decimal) -> Option<Side> {
    if yes_mid >= RESOLVED_HIGH {
        Some(Side::Yes)
    } else if yes_mid <= RESOLVED_LOW {
        Some(Side::No)
    } else {
        None
    }
}

pub struct Cashout {
    api: Arc<dyn TradingApi>,
    breaker: Arc<CircuitBreaker>,
    events: TradingEvents,
}

impl Cashout {
    pub fn new(api: Arc<dyn TradingApi>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            api,
            breaker,
            events: TradingEvents,
        }
    }

    /// Detect resolution from the settlement-probe price and flatten
    /// any open position at the market. Returns `true` when the market
    /// should skip normal order management this cycle.
    pub async fn check_resolved(
        &self,
        ticker: &Ticker,
        touch: &Touch,
        inventory: i64,
    ) -> ApiResult<bool> {
        let yes_mid = match self.api.last_price(ticker).await {
            Ok(Some(mid)) => mid,
            Ok(None) => return Ok(false),
            Err(err) => {
                warn!(ticker = %ticker, %err, "settlement price probe failed");
                return Ok(false);
            }
        };

        let Some(side) = resolved_side(yes_mid) else {
            return Ok(false);
        };

        info!(ticker = %ticker, yes_mid = %yes_mid, resolved = %side, "resolved market detected");
        if inventory == 0 {
            // Nothing to flatten; still skip quoting.
            return Ok(true);
        }

        self.cancel_all(ticker).await?;
        self.flatten(ticker, touch, inventory).await;
        Ok(true)
    }

    /// Flatten immediately by crossing the spread: long sells at the
    /// bid, short buys back at the ask.
    pub async fn flatten(&self, ticker: &Ticker, touch: &Touch, inventory: i64) {
        let (action, price) = if inventory > 0 {
            (Action::Sell, touch.bid)
        } else {
            (Action::Buy, touch.ask)
        };
        let request = OrderRequest {
            ticker: ticker.clone(),
            side: Side::Yes,
            action,
            price,
            count: inventory.abs(),
        };
        match self.api.place_order(&request).await {
            Ok(id) => {
                info!(ticker = %ticker, order_id = %id, "flattening order placed");
                self.events.order_placed(
                    ticker,
                    Side::Yes,
                    action,
                    price.inner(),
                    request.count,
                );
                self.breaker.record_success();
            }
            Err(ApiError::InsufficientBalance) => {
                warn!(ticker = %ticker, "flattening order skipped, insufficient balance");
            }
            Err(err) => {
                warn!(ticker = %ticker, %err, "flattening order failed");
                self.breaker.record_error(format!("flatten: {err}"));
            }
        }
    }

    async fn cancel_all(&self, ticker: &Ticker) -> ApiResult<()> {
        for order in self.api.resting_orders(ticker).await? {
            if let Err(err) = self.api.cancel_order(&order.id).await {
                warn!(ticker = %ticker, order_id = %order.id, %err, "cancel before cashout failed");
            }
        }
        Ok(())
    }
}
