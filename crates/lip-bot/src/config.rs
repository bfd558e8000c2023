//! Application configuration.

use crate::error::{AppError, AppResult};
use chrono::Duration as ChronoDuration;
use lip_feed::ListenerConfig;
use lip_mm::MakerConfig;
use lip_risk::{BreakerConfig, ToxicityParams};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Exchange backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    /// In-memory exchange, no network orders.
    #[default]
    Paper,
    /// Live exchange client, wired in by the deployment build.
    Live,
}

/// Top-level configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub mode: OperatingMode,
    #[serde(default)]
    pub maker: MakerConfig,
    #[serde(default)]
    pub toxicity: ToxicityConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&raw).map_err(|e| {
            AppError::Config(format!("{}: {e}", path.as_ref().display()))
        })
    }
}

/// Markout and toxicity parameters in file-friendly units.
#[derive(Debug, Clone, Deserialize)]
pub struct ToxicityConfig {
    #[serde(default = "default_short_horizon_secs")]
    pub short_horizon_secs: i64,
    #[serde(default = "default_long_horizon_secs")]
    pub long_horizon_secs: i64,
    #[serde(default = "default_alpha")]
    pub alpha: Decimal,
    #[serde(default = "default_bad_threshold")]
    pub bad_threshold: Decimal,
    #[serde(default = "default_edge_bump")]
    pub edge_bump: Decimal,
    #[serde(default = "default_width_bump")]
    pub width_bump: Decimal,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: i64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_short_horizon_secs() -> i64 {
    5
}

fn default_long_horizon_secs() -> i64 {
    30
}

fn default_alpha() -> Decimal {
    dec!(0.4)
}

fn default_bad_threshold() -> Decimal {
    dec!(-0.003)
}

fn default_edge_bump() -> Decimal {
    dec!(0.002)
}

fn default_width_bump() -> Decimal {
    dec!(0.01)
}

fn default_cooldown_secs() -> i64 {
    1800
}

fn default_queue_capacity() -> usize {
    2000
}

impl Default for ToxicityConfig {
    fn default() -> Self {
        Self {
            short_horizon_secs: default_short_horizon_secs(),
            long_horizon_secs: default_long_horizon_secs(),
            alpha: default_alpha(),
            bad_threshold: default_bad_threshold(),
            edge_bump: default_edge_bump(),
            width_bump: default_width_bump(),
            cooldown_secs: default_cooldown_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl ToxicityConfig {
    pub fn to_params(&self) -> ToxicityParams {
        ToxicityParams {
            short_horizon: ChronoDuration::seconds(self.short_horizon_secs),
            long_horizon: ChronoDuration::seconds(self.long_horizon_secs),
            alpha: self.alpha,
            bad_threshold: self.bad_threshold,
            edge_bump: self.edge_bump,
            width_bump: self.width_bump,
            cooldown: ChronoDuration::seconds(self.cooldown_secs),
        }
    }
}

/// Fill stream connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub url: String,
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_feed_url() -> String {
    "wss://api.elections.kalshi.com/trade-api/ws/v2".to_string()
}

fn default_initial_backoff_secs() -> u64 {
    1
}

fn default_max_backoff_secs() -> u64 {
    60
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            initial_backoff_secs: default_initial_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl FeedConfig {
    pub fn to_listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            url: self.url.clone(),
            initial_backoff: Duration::from_secs(self.initial_backoff_secs),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
        }
    }
}

/// Main loop cadences and worker pool sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestrationConfig {
    /// Main loop period in milliseconds.
    #[serde(default = "default_loop_period_ms")]
    pub loop_period_ms: u64,
    /// Concurrent per-market tasks.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Liquidity program target refresh cadence, seconds.
    #[serde(default = "default_target_refresh_secs")]
    pub target_refresh_secs: u64,
    /// Portfolio P&L / imbalance check cadence, seconds.
    #[serde(default = "default_pnl_check_secs")]
    pub pnl_check_secs: u64,
    /// Discovery scan cadence, seconds.
    #[serde(default = "default_discovery_secs")]
    pub discovery_secs: u64,
    /// New markets entered per discovery scan.
    #[serde(default = "default_discovery_max_new")]
    pub discovery_max_new: usize,
    /// Program entries examined per discovery scan.
    #[serde(default = "default_discovery_scan_cap")]
    pub discovery_scan_cap: usize,
    /// Tickers held deliberately by the operator, never auto-tracked.
    #[serde(default)]
    pub my_positions: Vec<String>,
}

fn default_loop_period_ms() -> u64 {
    1000
}

fn default_workers() -> usize {
    5
}

fn default_target_refresh_secs() -> u64 {
    60
}

fn default_pnl_check_secs() -> u64 {
    60
}

fn default_discovery_secs() -> u64 {
    60
}

fn default_discovery_max_new() -> usize {
    8
}

fn default_discovery_scan_cap() -> usize {
    100
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            loop_period_ms: default_loop_period_ms(),
            workers: default_workers(),
            target_refresh_secs: default_target_refresh_secs(),
            pnl_check_secs: default_pnl_check_secs(),
            discovery_secs: default_discovery_secs(),
            discovery_max_new: default_discovery_max_new(),
            discovery_scan_cap: default_discovery_scan_cap(),
            my_positions: Vec::new(),
        }
    }
}
