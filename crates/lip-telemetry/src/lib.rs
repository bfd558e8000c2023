//! Observability: logging initialization and structured trading events.
//!
//! Everything downstream (dashboards, alerting) consumes the JSON log
//! stream; there is no separate metrics transport.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use events::TradingEvents;
pub use logging::init_logging;
