//! Fill-driven position and P&L ledger.

pub mod ledger;

pub use ledger::{Position, PositionLedger};
