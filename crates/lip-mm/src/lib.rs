//! Quote engine: fair value, bid/ask computation, sizing, and the
//! one-tick improvement gate.

pub mod config;
pub mod fair;
pub mod gate;
pub mod quotes;
pub mod sizing;

pub use config::MakerConfig;
pub use fair::compute_fair;
pub use gate::ImprovementGate;
pub use quotes::{compute_quotes, QuoteInputs};
pub use sizing::{desired_size, max_affordable_size, order_capital_required, SizingInputs};
