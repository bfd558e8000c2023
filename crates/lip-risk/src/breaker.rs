//! Latched trading halt.
//!
//! Once tripped, the breaker stays tripped until an operator calls
//! `reset()`. Auto-reset is prohibited.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

/// Reason the breaker tripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TripReason {
    /// Too many consecutive API failures.
    ConsecutiveErrors { count: u32 },
    /// Portfolio P&L fell through the floor.
    PnlFloorBreached { pnl: Decimal },
    /// Manual trigger by operator.
    Manual { message: String },
}

impl std::fmt::Display for TripReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConsecutiveErrors { count } => write!(f, "consecutive errors: {}", count),
            Self::PnlFloorBreached { pnl } => write!(f, "pnl floor breached: ${}", pnl),
            Self::Manual { message } => write!(f, "manual: {}", message),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive API errors before halting.
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
    /// Portfolio P&L below this trips the breaker (dollars).
    #[serde(default = "default_pnl_floor")]
    pub pnl_floor: Decimal,
    /// Inventory imbalance alert level as a fraction of max position.
    #[serde(default = "default_imbalance_alert_frac")]
    pub imbalance_alert_frac: Decimal,
}

fn default_max_consecutive_errors() -> u32 {
    10
}

fn default_pnl_floor() -> Decimal {
    dec!(-100)
}

fn default_imbalance_alert_frac() -> Decimal {
    dec!(0.8)
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_errors: default_max_consecutive_errors(),
            pnl_floor: default_pnl_floor(),
            imbalance_alert_frac: default_imbalance_alert_frac(),
        }
    }
}

/// Point-in-time breaker view for operators and logs.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    pub trading_allowed: bool,
    pub consecutive_errors: u32,
    pub trip_reason: Option<String>,
    pub tripped_at: Option<DateTime<Utc>>,
    /// Most recent error descriptions, newest last.
    pub recent_errors: Vec<String>,
}

struct ErrorLog {
    consecutive: u32,
    recent: VecDeque<String>,
}

/// Circuit breaker shared across the orchestrator and reconcilers.
///
/// Thread-safe behind `Arc<CircuitBreaker>`.
pub struct CircuitBreaker {
    config: BreakerConfig,
    tripped: AtomicBool,
    tripped_at: RwLock<Option<DateTime<Utc>>>,
    reason: RwLock<Option<TripReason>>,
    errors: Mutex<ErrorLog>,
}

const ERROR_LOG_CAP: usize = 100;
const STATUS_ERRORS: usize = 10;

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            tripped: AtomicBool::new(false),
            tripped_at: RwLock::new(None),
            reason: RwLock::new(None),
            errors: Mutex::new(ErrorLog {
                consecutive: 0,
                recent: VecDeque::new(),
            }),
        }
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// True while trading may continue.
    pub fn is_trading_allowed(&self) -> bool {
        !self.tripped.load(Ordering::SeqCst)
    }

    /// Record one API failure. Trips once the consecutive count reaches
    /// the configured maximum.
    pub fn record_error(&self, context: impl Into<String>) {
        let context = context.into();
        let count = {
            let mut log = self.errors.lock();
            log.consecutive += 1;
            log.recent.push_back(context.clone());
            while log.recent.len() > ERROR_LOG_CAP {
                log.recent.pop_front();
            }
            log.consecutive
        };
        warn!(count, context = %context, "api error recorded");

        if count >= self.config.max_consecutive_errors {
            self.trip(TripReason::ConsecutiveErrors { count });
        }
    }

    /// Record one API success, resetting the consecutive counter.
    pub fn record_success(&self) {
        let mut log = self.errors.lock();
        if log.consecutive > 0 {
            log.consecutive = 0;
        }
    }

    /// Trip on portfolio P&L strictly below the configured floor.
    pub fn check_pnl(&self, pnl: Decimal) {
        if pnl < self.config.pnl_floor {
            self.trip(TripReason::PnlFloorBreached { pnl });
        }
    }

    /// Alert (without tripping) when one market's inventory exceeds the
    /// imbalance fraction of the position cap.
    pub fn check_imbalance(&self, ticker: &str, inventory: i64, max_position: i64) {
        let limit = Decimal::from(max_position) * self.config.imbalance_alert_frac;
        if Decimal::from(inventory.abs()) > limit {
            warn!(ticker, inventory, max_position, "inventory imbalance alert");
        }
    }

    /// Trip the breaker. If already tripped, keeps the original reason.
    pub fn trip(&self, reason: TripReason) {
        if self
            .tripped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.tripped_at.write() = Some(Utc::now());
            *self.reason.write() = Some(reason.clone());
            error!(reason = %reason, "CIRCUIT BREAKER TRIPPED, trading halted");
        } else {
            warn!(new_reason = %reason, "breaker already tripped, ignoring");
        }
    }

    /// Manual operator reset after the underlying issue is resolved.
    pub fn reset(&self) {
        if !self.is_trading_allowed() {
            let previous = self.reason.read().clone();
            info!(previous_reason = ?previous, "circuit breaker manually reset");
            self.tripped.store(false, Ordering::SeqCst);
            *self.tripped_at.write() = None;
            *self.reason.write() = None;
            self.errors.lock().consecutive = 0;
        }
    }

    pub fn status(&self) -> BreakerStatus {
        let log = self.errors.lock();
        BreakerStatus {
            trading_allowed: self.is_trading_allowed(),
            consecutive_errors: log.consecutive,
            trip_reason: self.reason.read().as_ref().map(|r| r.to_string()),
            tripped_at: *self.tripped_at.read(),
            recent_errors: log
                .recent
                .iter()
                .rev()
                .take(STATUS_ERRORS)
                .rev()
                .cloned()
                .collect(),
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
