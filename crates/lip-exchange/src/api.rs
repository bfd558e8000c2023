//! The exchange capability set consumed by the maker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lip_core::{Action, LiquidityProgram, OrderBook, OrderId, Price, RestingOrder, Side, Ticker, Touch};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors surfaced by the trading API.
///
/// `InsufficientBalance` is split out because the reconciler treats it
/// as a benign skip rather than an exchange failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("unknown market: {0}")]
    UnknownMarket(Ticker),
    #[error("unknown order: {0}")]
    UnknownOrder(OrderId),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("exchange rejected request: {0}")]
    Rejected(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// A new limit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub ticker: Ticker,
    pub side: Side,
    pub action: Action,
    pub price: Price,
    pub count: i64,
}

/// Exchange operations the maker depends on.
///
/// Object safe so the orchestrator can hold `Arc<dyn TradingApi>` and
/// tests can swap in [`crate::MockTradingApi`].
#[async_trait]
pub trait TradingApi: Send + Sync {
    /// Current YES touch, or `None` when either side of the book is empty.
    async fn touch(&self, ticker: &Ticker) -> ApiResult<Option<Touch>>;

    /// Full resting-bid ladders for both contract sides.
    async fn order_book(&self, ticker: &Ticker) -> ApiResult<OrderBook>;

    /// Our live orders in one market.
    async fn resting_orders(&self, ticker: &Ticker) -> ApiResult<Vec<RestingOrder>>;

    /// Our live orders across all markets.
    async fn all_resting_orders(&self) -> ApiResult<Vec<RestingOrder>>;

    /// Signed YES-equivalent contract position in one market.
    async fn position(&self, ticker: &Ticker) -> ApiResult<i64>;

    /// All nonzero signed positions.
    async fn positions(&self) -> ApiResult<HashMap<Ticker, i64>>;

    /// Available (unreserved) cash balance in dollars.
    async fn balance(&self) -> ApiResult<Decimal>;

    async fn place_order(&self, request: &OrderRequest) -> ApiResult<OrderId>;

    async fn cancel_order(&self, id: &OrderId) -> ApiResult<()>;

    /// Markets currently enrolled in the liquidity incentive program.
    async fn liquidity_programs(&self) -> ApiResult<Vec<LiquidityProgram>>;

    /// Last traded / settlement-probe YES price, when the exchange has one.
    async fn last_price(&self, ticker: &Ticker) -> ApiResult<Option<Decimal>>;

    /// Market close timestamp, when known.
    async fn expiry(&self, ticker: &Ticker) -> ApiResult<Option<DateTime<Utc>>>;
}
