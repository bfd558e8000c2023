//! Main application orchestration.
//!
//! One loop drives everything: markout drain, liquidity target
//! refresh, per-market processing over a bounded worker pool, the
//! portfolio risk check, and discovery. The fill stream runs as an
//! independent task and feeds the ledger and markout queue through a
//! bounded channel.

use crate::config::AppConfig;
use crate::discovery::MarketDiscovery;
use crate::error::AppResult;
use crate::processor::{MarketOutcome, MarketProcessor};
use chrono::{DateTime, Utc};
use lip_core::{Fill, Side, Ticker};
use lip_exchange::{MockTradingApi, TradingApi};
use lip_executor::resolved_side;
use lip_feed::{FillStreamListener, NoAuth, StreamAuth};
use lip_mm::ImprovementGate;
use lip_position::PositionLedger;
use lip_risk::{CircuitBreaker, MarkoutQueue, ToxicityParams, ToxicityTracker};
use lip_telemetry::TradingEvents;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Working set for one cycle: every market we have exposure in, plus
/// everything deliberately tracked, minus the operator's own holds.
fn working_set(
    order_tickers: impl IntoIterator<Item = Ticker>,
    positions: &HashMap<Ticker, i64>,
    tracked: &HashSet<Ticker>,
    excluded: &HashSet<Ticker>,
) -> HashSet<Ticker> {
    let mut set: HashSet<Ticker> = order_tickers.into_iter().collect();
    set.extend(
        positions
            .iter()
            .filter(|(_, contracts)| **contracts != 0)
            .map(|(ticker, _)| ticker.clone()),
    );
    set.extend(tracked.iter().cloned());
    set.retain(|ticker| !excluded.contains(ticker));
    set
}

/// Forward fills from the stream to the ledger and markout queue.
async fn route_fills(
    mut fills: mpsc::Receiver<Fill>,
    ledger: Arc<PositionLedger>,
    markouts: Arc<MarkoutQueue>,
    params: ToxicityParams,
    events: TradingEvents,
) {
    while let Some(fill) = fills.recv().await {
        events.fill(&fill);
        ledger.apply_fill(&fill);
        markouts.enqueue_fill(&fill, &params, Utc::now());
    }
    debug!("fill router stopped");
}

/// Main application.
pub struct Application {
    config: AppConfig,
    api: Arc<dyn TradingApi>,
    auth: Arc<dyn StreamAuth>,
    ledger: Arc<PositionLedger>,
    breaker: Arc<CircuitBreaker>,
    toxicity: Arc<ToxicityTracker>,
    markouts: Arc<MarkoutQueue>,
    gate: Arc<ImprovementGate>,
    processor: Arc<MarketProcessor>,
    discovery: MarketDiscovery,
    events: TradingEvents,
    targets: Arc<RwLock<HashMap<Ticker, i64>>>,
    expiries: Arc<RwLock<HashMap<Ticker, DateTime<Utc>>>>,
    tracked: Mutex<HashSet<Ticker>>,
    excluded: HashSet<Ticker>,
    cancel: CancellationToken,
}

impl Application {
    pub fn new(config: AppConfig, api: Arc<dyn TradingApi>, auth: Arc<dyn StreamAuth>) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(config.breaker.clone()));
        let toxicity = Arc::new(ToxicityTracker::new(config.toxicity.to_params()));
        let markouts = Arc::new(MarkoutQueue::new(config.toxicity.queue_capacity));
        let gate = Arc::new(ImprovementGate::new(
            config.maker.improve_once_per_touch,
            config.maker.improve_cooldown_secs,
        ));
        let targets = Arc::new(RwLock::new(HashMap::new()));
        let expiries = Arc::new(RwLock::new(HashMap::new()));
        let processor = Arc::new(MarketProcessor::new(
            Arc::clone(&api),
            Arc::clone(&breaker),
            Arc::clone(&toxicity),
            Arc::clone(&gate),
            config.maker.clone(),
            Arc::clone(&targets),
            Arc::clone(&expiries),
        ));
        let discovery = MarketDiscovery::new(
            Arc::clone(&api),
            Arc::clone(&toxicity),
            config.orchestration.discovery_scan_cap,
        );
        let excluded = config
            .orchestration
            .my_positions
            .iter()
            .map(Ticker::new)
            .collect();

        Self {
            config,
            api,
            auth,
            ledger: Arc::new(PositionLedger::new()),
            breaker,
            toxicity,
            markouts,
            gate,
            processor,
            discovery,
            events: TradingEvents,
            targets,
            expiries,
            tracked: Mutex::new(HashSet::new()),
            excluded,
            cancel: CancellationToken::new(),
        }
    }

    /// Paper mode: the in-memory exchange and no stream auth.
    pub fn paper(config: AppConfig) -> Self {
        Self::new(config, Arc::new(MockTradingApi::new()), Arc::new(NoAuth))
    }

    /// Handle for requesting shutdown from outside the loop.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until cancelled or the breaker-halted loop is shut down.
    pub async fn run(&self) -> AppResult<()> {
        self.events.startup(env!("CARGO_PKG_VERSION"));

        let (fill_tx, fill_rx) = mpsc::channel(self.config.feed.channel_capacity);
        let listener = FillStreamListener::new(
            self.config.feed.to_listener_config(),
            Arc::clone(&self.auth),
            fill_tx,
            self.cancel.child_token(),
        );
        let listener_handle = listener.spawn();
        let router_handle = tokio::spawn(route_fills(
            fill_rx,
            Arc::clone(&self.ledger),
            Arc::clone(&self.markouts),
            self.toxicity.params().clone(),
            self.events,
        ));

        let shutdown = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                shutdown.cancel();
            }
        });

        let loop_period = Duration::from_millis(self.config.orchestration.loop_period_ms);
        let refresh_period = Duration::from_secs(self.config.orchestration.target_refresh_secs);
        let pnl_period = Duration::from_secs(self.config.orchestration.pnl_check_secs);
        let discovery_period = Duration::from_secs(self.config.orchestration.discovery_secs);

        let mut last_refresh: Option<Instant> = None;
        let mut last_pnl: Option<Instant> = None;
        let mut last_discovery: Option<Instant> = None;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if !self.breaker.is_trading_allowed() {
                let status = self.breaker.status();
                warn!(reason = ?status.trip_reason, "breaker open, trading halted");
                self.events.breaker(false, status.consecutive_errors);
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = sleep(loop_period) => {}
                }
                continue;
            }

            self.drain_markouts().await;

            if last_refresh.map_or(true, |at| at.elapsed() >= refresh_period) {
                self.refresh_targets().await;
                last_refresh = Some(Instant::now());
            }

            self.run_market_cycle().await;

            if last_pnl.map_or(true, |at| at.elapsed() >= pnl_period) {
                self.check_portfolio().await;
                last_pnl = Some(Instant::now());
            }

            if last_discovery.map_or(true, |at| at.elapsed() >= discovery_period) {
                self.run_discovery().await;
                last_discovery = Some(Instant::now());
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(loop_period) => {}
            }
        }

        self.events.shutdown("orchestrator loop exited");
        self.cancel.cancel();
        if tokio::time::timeout(Duration::from_secs(5), listener_handle)
            .await
            .is_err()
        {
            warn!("fill stream listener did not stop in time");
        }
        router_handle.abort();
        Ok(())
    }

    /// Resolve due markout checkpoints against the current YES mid.
    async fn drain_markouts(&self) {
        let now = Utc::now();
        for check in self.markouts.take_due(now) {
            match self.api.touch(&check.ticker).await {
                Ok(Some(touch)) if touch.is_valid() => {
                    let mid = touch.mid();
                    let markout =
                        Decimal::from(check.direction as i64) * (mid - check.entry_price);
                    let ema = self.toxicity.observe_check(&check, mid);
                    self.events.markout(
                        &check.ticker,
                        match check.horizon {
                            lip_risk::Horizon::Short => "short",
                            lip_risk::Horizon::Long => "long",
                        },
                        markout,
                        ema,
                    );
                }
                // No usable mid right now; try again next drain.
                Ok(_) | Err(_) => self.markouts.requeue(check),
            }
        }
    }

    /// Re-pull the liquidity program listing into the target and
    /// expiry maps.
    async fn refresh_targets(&self) {
        match self.api.liquidity_programs().await {
            Ok(programs) => {
                let mut targets = self.targets.write();
                targets.clear();
                let mut expiries = self.expiries.write();
                for program in programs {
                    targets.insert(program.ticker.clone(), program.target_size);
                    if let Some(end) = program.end_ts {
                        expiries.insert(program.ticker.clone(), end);
                    }
                }
                debug!(markets = targets.len(), "liquidity targets refreshed");
            }
            Err(err) => warn!(%err, "liquidity target refresh failed"),
        }
    }

    /// Fan the working set out over the bounded worker pool and prune
    /// whatever the processors untracked.
    async fn run_market_cycle(&self) {
        let orders = match self.api.all_resting_orders().await {
            Ok(orders) => orders,
            Err(err) => {
                self.breaker.record_error(format!("resting orders: {err}"));
                return;
            }
        };
        let positions = match self.api.positions().await {
            Ok(positions) => positions,
            Err(err) => {
                self.breaker.record_error(format!("positions: {err}"));
                return;
            }
        };

        let markets = working_set(
            orders.into_iter().map(|o| o.ticker),
            &positions,
            &self.tracked.lock(),
            &self.excluded,
        );
        if markets.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.orchestration.workers));
        let mut tasks = JoinSet::new();
        for ticker in markets {
            let semaphore = Arc::clone(&semaphore);
            let processor = Arc::clone(&self.processor);
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (ticker, MarketOutcome::keep());
                };
                let outcome = processor.process(&ticker).await;
                (ticker, outcome)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((ticker, outcome)) if outcome.untrack => {
                    self.untrack(&ticker, outcome.reason.unwrap_or("done"));
                }
                Ok(_) => {}
                Err(err) => error!(%err, "market task failed"),
            }
        }
    }

    fn untrack(&self, ticker: &Ticker, reason: &str) {
        self.tracked.lock().remove(ticker);
        self.processor.forget(ticker);
        self.events.market_untracked(ticker, reason);
    }

    /// Portfolio P&L and inventory imbalance, fed to the breaker.
    async fn check_portfolio(&self) {
        let open = self.ledger.open_positions();
        let mut mids: HashMap<Ticker, Decimal> = HashMap::new();
        for (ticker, _) in &open {
            if let Ok(Some(mid)) = self.api.last_price(ticker).await {
                mids.insert(ticker.clone(), mid);
            }
        }

        let total = self.ledger.total_pnl(|ticker| mids.get(ticker).copied());
        self.events
            .pnl_snapshot(total, self.ledger.total_realized_pnl());
        self.breaker.check_pnl(total);

        for (ticker, position) in &open {
            self.events
                .inventory(ticker, position.inventory, position.avg_price);
            // A resolved market legitimately carries its full position
            // until the cash-out lands; not an imbalance.
            let resolved = mids
                .get(ticker)
                .map_or(false, |mid| resolved_side(*mid).is_some());
            if !resolved {
                self.breaker.check_imbalance(
                    ticker.as_str(),
                    position.inventory,
                    self.config.maker.max_position,
                );
            }
        }
    }

    /// Enter the best-scoring discovered markets, seeding the gate and
    /// quoting immediately.
    async fn run_discovery(&self) {
        if !self.breaker.is_trading_allowed() {
            return;
        }
        let tracked_snapshot = self.tracked.lock().clone();
        let candidates = self.discovery.scan(&tracked_snapshot, &self.excluded).await;

        let mut entered = 0;
        for candidate in candidates {
            if entered >= self.config.orchestration.discovery_max_new {
                break;
            }
            let ticker = candidate.ticker.clone();
            if let Ok(Some(touch)) = self.api.touch(&ticker).await {
                self.gate.seed(&ticker, Side::Yes, &touch);
            }
            self.targets
                .write()
                .insert(ticker.clone(), candidate.target_size);
            if let Some(end) = candidate.end_ts {
                self.expiries.write().insert(ticker.clone(), end);
            }
            self.tracked.lock().insert(ticker.clone());
            self.events
                .market_tracked(&ticker, candidate.score, candidate.target_size);
            entered += 1;

            // First pass right away so quotes go out this cycle.
            let outcome = self.processor.process(&ticker).await;
            if outcome.untrack {
                self.untrack(&ticker, outcome.reason.unwrap_or("done"));
            }
        }
        if entered > 0 {
            info!(entered, "discovery entered new markets");
        }
    }
}
