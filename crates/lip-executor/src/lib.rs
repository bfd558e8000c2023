//! Order execution: reconciliation against desired quotes, and
//! cashing out of resolved or expiring markets.

pub mod cashout;
pub mod reconciler;

pub use cashout::{resolved_side, Cashout};
pub use reconciler::{OrderReconciler, ReconcileInputs};
