//! Core domain types for the liquidity-program market maker.
//!
//! This crate provides fundamental types used throughout the system:
//! - `Ticker`: Unique market identifier
//! - `Price`: Cent-tick decimal price bounded to the binary contract range
//! - `Touch`, `OrderBook`: Top-of-book and depth views in YES space
//! - `Side`, `Action`, `RestingOrder`, `Fill`: Order and trade primitives

pub mod market;
pub mod order;
pub mod price;

pub use market::{DiscoveryCandidate, LiquidityProgram, OrderBook, Ticker, Touch};
pub use order::{yes_equivalent, Action, Fill, OrderId, RestingOrder, Side};
pub use price::Price;
