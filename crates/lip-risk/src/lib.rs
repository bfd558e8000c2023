//! Safety machinery: circuit breaker and toxicity adaptation.
//!
//! `CircuitBreaker`: latched trading halt on consecutive API failures
//! or a portfolio P&L floor breach. Manual reset only.
//!
//! `ToxicityTracker` / `MarkoutQueue`: post-fill markout measurement
//! feeding a per-market EMA that widens quotes, throttles buying, and
//! ultimately benches a market for a cooldown period.

pub mod breaker;
pub mod markout;

pub use breaker::{BreakerConfig, BreakerStatus, CircuitBreaker, TripReason};
pub use markout::{Horizon, MarkoutCheck, MarkoutQueue, ToxicityParams, ToxicityTracker};
