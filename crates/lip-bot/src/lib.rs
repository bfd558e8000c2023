//! Liquidity-incentive-program market maker.
//!
//! Orchestrates the full trading loop:
//! - WebSocket fill stream feeding the position ledger and markout queue
//! - Per-market quote/reconcile processing over a bounded worker pool
//! - Market discovery against the exchange's liquidity program listing
//! - Portfolio P&L and inventory checks feeding the circuit breaker

pub mod app;
pub mod config;
pub mod discovery;
pub mod error;
pub mod processor;

pub use app::Application;
pub use config::{AppConfig, OperatingMode};
pub use error::{AppError, AppResult};
