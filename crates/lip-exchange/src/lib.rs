//! Trading API abstraction.
//!
//! The live exchange client (auth, signing, pagination) lives outside
//! this workspace; everything here consumes the exchange through the
//! object-safe [`TradingApi`] trait. [`MockTradingApi`] provides a
//! deterministic in-memory backend for tests.

pub mod api;
pub mod mock;

pub use api::{ApiError, ApiResult, OrderRequest, TradingApi};
pub use mock::MockTradingApi;
