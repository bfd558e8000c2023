//! Deterministic in-memory exchange for tests.

use crate::api::{ApiError, ApiResult, OrderRequest, TradingApi};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lip_core::{LiquidityProgram, OrderBook, OrderId, RestingOrder, Ticker, Touch};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Default)]
struct MockState {
    touches: HashMap<Ticker, Touch>,
    books: HashMap<Ticker, OrderBook>,
    orders: Vec<RestingOrder>,
    positions: HashMap<Ticker, i64>,
    balance: Decimal,
    programs: Vec<LiquidityProgram>,
    last_prices: HashMap<Ticker, Decimal>,
    expiries: HashMap<Ticker, DateTime<Utc>>,
    placed: Vec<OrderRequest>,
    canceled: Vec<OrderId>,
    next_id: u64,
    fail_next_place: Option<ApiError>,
    fail_touch: Option<ApiError>,
    fail_position: Option<ApiError>,
}

/// Scriptable exchange double.
///
/// Setters stage market state; the `placed_orders` / `canceled_orders`
/// accessors let tests assert on the exact call sequence. Placed
/// orders become resting orders immediately (no fills are simulated).
#[derive(Default)]
pub struct MockTradingApi {
    state: Mutex<MockState>,
}

impl MockTradingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_touch(&self, ticker: &Ticker, touch: Touch) {
        self.state.lock().touches.insert(ticker.clone(), touch);
    }

    pub fn clear_touch(&self, ticker: &Ticker) {
        self.state.lock().touches.remove(ticker);
    }

    pub fn set_book(&self, ticker: &Ticker, book: OrderBook) {
        self.state.lock().books.insert(ticker.clone(), book);
    }

    pub fn set_position(&self, ticker: &Ticker, contracts: i64) {
        self.state.lock().positions.insert(ticker.clone(), contracts);
    }

    pub fn set_balance(&self, dollars: Decimal) {
        self.state.lock().balance = dollars;
    }

    pub fn set_programs(&self, programs: Vec<LiquidityProgram>) {
        self.state.lock().programs = programs;
    }

    pub fn set_last_price(&self, ticker: &Ticker, price: Decimal) {
        self.state.lock().last_prices.insert(ticker.clone(), price);
    }

    pub fn set_expiry(&self, ticker: &Ticker, at: DateTime<Utc>) {
        self.state.lock().expiries.insert(ticker.clone(), at);
    }

    /// Seed a live order directly, bypassing `place_order` bookkeeping.
    pub fn seed_order(&self, order: RestingOrder) {
        self.state.lock().orders.push(order);
    }

    pub fn fail_next_place(&self, err: ApiError) {
        self.state.lock().fail_next_place = Some(err);
    }

    pub fn fail_touch(&self, err: ApiError) {
        self.state.lock().fail_touch = Some(err);
    }

    pub fn fail_position(&self, err: ApiError) {
        self.state.lock().fail_position = Some(err);
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.state.lock().placed.clone()
    }

    pub fn canceled_orders(&self) -> Vec<OrderId> {
        self.state.lock().canceled.clone()
    }

    pub fn live_orders(&self) -> Vec<RestingOrder> {
        self.state.lock().orders.clone()
    }
}

#[async_trait]
impl TradingApi for MockTradingApi {
    async fn touch(&self, ticker: &Ticker) -> ApiResult<Option<Touch>> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_touch.take() {
            return Err(err);
        }
        Ok(state.touches.get(ticker).copied())
    }

    async fn order_book(&self, ticker: &Ticker) -> ApiResult<OrderBook> {
        Ok(self.state.lock().books.get(ticker).cloned().unwrap_or_default())
    }

    async fn resting_orders(&self, ticker: &Ticker) -> ApiResult<Vec<RestingOrder>> {
        Ok(self
            .state
            .lock()
            .orders
            .iter()
            .filter(|o| &o.ticker == ticker)
            .cloned()
            .collect())
    }

    async fn all_resting_orders(&self) -> ApiResult<Vec<RestingOrder>> {
        Ok(self.state.lock().orders.clone())
    }

    async fn position(&self, ticker: &Ticker) -> ApiResult<i64> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_position.take() {
            return Err(err);
        }
        Ok(state.positions.get(ticker).copied().unwrap_or(0))
    }

    async fn positions(&self) -> ApiResult<HashMap<Ticker, i64>> {
        Ok(self
            .state
            .lock()
            .positions
            .iter()
            .filter(|(_, &v)| v != 0)
            .map(|(k, &v)| (k.clone(), v))
            .collect())
    }

    async fn balance(&self) -> ApiResult<Decimal> {
        Ok(self.state.lock().balance)
    }

    async fn place_order(&self, request: &OrderRequest) -> ApiResult<OrderId> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_next_place.take() {
            return Err(err);
        }
        state.next_id += 1;
        let id = OrderId(format!("mock-{}", state.next_id));
        state.placed.push(request.clone());
        state.orders.push(RestingOrder {
            id: id.clone(),
            ticker: request.ticker.clone(),
            side: request.side,
            action: request.action,
            price: request.price,
            remaining: request.count,
        });
        Ok(id)
    }

    async fn cancel_order(&self, id: &OrderId) -> ApiResult<()> {
        let mut state = self.state.lock();
        let before = state.orders.len();
        state.orders.retain(|o| &o.id != id);
        if state.orders.len() == before {
            return Err(ApiError::UnknownOrder(id.clone()));
        }
        state.canceled.push(id.clone());
        Ok(())
    }

    async fn liquidity_programs(&self) -> ApiResult<Vec<LiquidityProgram>> {
        Ok(self.state.lock().programs.clone())
    }

    async fn last_price(&self, ticker: &Ticker) -> ApiResult<Option<Decimal>> {
        Ok(self.state.lock().last_prices.get(ticker).copied())
    }

    async fn expiry(&self, ticker: &Ticker) -> ApiResult<Option<DateTime<Utc>>> {
        Ok(self.state.lock().expiries.get(ticker).copied())
    }
}
