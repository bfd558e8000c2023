//! Market discovery against the liquidity program listing.
//!
//! Each scan pulls the active program entries, drops markets that are
//! unworkable (ending soon, short-lived, one-sided, resolved, or with
//! a toxic markout history), scores what remains per side, and hands
//! back candidates ranked best-first.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lip_core::{DiscoveryCandidate, Price, Side, Ticker};
use lip_exchange::TradingApi;
use lip_risk::ToxicityTracker;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Programs ending within this many days are not worth entering.
const MIN_DAYS_TO_END: i64 = 3;
/// Programs shorter than this never build enough volume.
const MIN_DURATION_HOURS: i64 = 28;

fn clip01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Composite side score in 0..=1000, higher is better.
///
/// Weighted multiplicative blend of monotone components: coverage,
/// discount factor, spread (rewarded up to ~20c), depth at the best
/// level, reward pool size, and time until the program ends.
pub fn score_candidate(entry: &DiscoveryCandidate, now: DateTime<Utc>) -> i64 {
    let coverage = entry.coverage.to_f64().unwrap_or(0.0);
    let spread = entry.spread.to_f64().unwrap_or(0.0);
    let target = entry.target_size.max(1) as f64;
    let df = entry.discount_factor.to_f64().unwrap_or(0.5);
    let reward = entry.reward_pool.to_f64().unwrap_or(0.0);
    let best = entry.best_size as f64;

    let time_score = entry.end_ts.map_or(1.0, |end| {
        let days = (end - now).num_seconds().max(0) as f64 / 86_400.0;
        clip01(1.0 - (-days / 30.0).exp())
    });

    let cov_score = clip01(coverage);
    let df_score = clip01(df).powf(1.15);
    let spread_score = clip01(spread / 0.20);
    let cap_score = clip01(best / target);
    let reward_score = clip01(1.0 - (-reward / 120.0).exp());

    let (w_cov, w_df, w_spread, w_cap, w_reward, w_time) = (1.0, 1.0, 0.9, 1.2, 1.0, 1.5);
    let comp = cov_score.powf(w_cov)
        * df_score.powf(w_df)
        * spread_score.powf(w_spread)
        * cap_score.powf(w_cap)
        * reward_score.powf(w_reward)
        * time_score.powf(w_time);

    (1000.0 * clip01(comp)).round() as i64
}

/// Best level of one bid side: (price, amount still needed toward the
/// target, size at the best level, coverage). `None` when the side is
/// empty or the target is degenerate.
fn analyze_side(levels: &[(Price, i64)], target: i64) -> Option<(Price, i64, i64, Decimal)> {
    if target <= 0 {
        return None;
    }
    let mut by_price: HashMap<Price, i64> = HashMap::new();
    for &(price, size) in levels {
        if size > 0 {
            *by_price.entry(price).or_default() += size;
        }
    }
    let (&best_price, &best_size) = by_price.iter().max_by_key(|(price, _)| **price)?;
    let amount_needed = (target - best_size).max(0);
    let coverage = Decimal::from(best_size.min(target)) / Decimal::from(target);
    Some((best_price, amount_needed, best_size, coverage))
}

/// Scans the liquidity program listing for markets worth quoting.
pub struct MarketDiscovery {
    api: Arc<dyn TradingApi>,
    toxicity: Arc<ToxicityTracker>,
    scan_cap: usize,
}

impl MarketDiscovery {
    pub fn new(api: Arc<dyn TradingApi>, toxicity: Arc<ToxicityTracker>, scan_cap: usize) -> Self {
        Self {
            api,
            toxicity,
            scan_cap,
        }
    }

    /// One discovery pass. Returns candidates sorted best-first, one
    /// per ticker (the better-scoring side wins), excluding anything
    /// already tracked or on the operator's personal-hold list.
    pub async fn scan(
        &self,
        tracked: &HashSet<Ticker>,
        excluded: &HashSet<Ticker>,
    ) -> Vec<DiscoveryCandidate> {
        let programs = match self.api.liquidity_programs().await {
            Ok(programs) => programs,
            Err(err) => {
                warn!(%err, "liquidity program listing failed");
                return Vec::new();
            }
        };

        let now = Utc::now();
        let mut best_by_ticker: HashMap<Ticker, DiscoveryCandidate> = HashMap::new();

        for program in programs.into_iter().take(self.scan_cap) {
            let ticker = program.ticker.clone();
            if tracked.contains(&ticker) || excluded.contains(&ticker) {
                continue;
            }
            // A market that hurt us before stays off the list until
            // its EMA recovers.
            if let Some(ema) = self.toxicity.ema(&ticker) {
                if ema <= self.toxicity.params().very_bad_threshold() {
                    debug!(ticker = %ticker, ema = %ema, "skipping historically toxic market");
                    continue;
                }
            }
            if let Some(end) = program.end_ts {
                if end < now + ChronoDuration::days(MIN_DAYS_TO_END) {
                    debug!(ticker = %ticker, "program ends too soon");
                    continue;
                }
                if let Some(start) = program.start_ts {
                    if (end - start).num_hours() < MIN_DURATION_HOURS {
                        debug!(ticker = %ticker, "program duration too short");
                        continue;
                    }
                }
            }

            let book = match self.api.order_book(&ticker).await {
                Ok(book) => book,
                Err(err) => {
                    debug!(ticker = %ticker, %err, "order book fetch failed");
                    continue;
                }
            };
            if book.yes.is_empty() || book.no.is_empty() {
                debug!(ticker = %ticker, "one-sided book");
                continue;
            }
            match self.api.last_price(&ticker).await {
                Ok(Some(mid)) if mid >= dec!(0.90) || mid <= dec!(0.10) => {
                    debug!(ticker = %ticker, yes_mid = %mid, "market looks resolved");
                    continue;
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(ticker = %ticker, %err, "price probe failed");
                    continue;
                }
            }

            let spread = match (book.best_yes_bid(), book.best_yes_ask()) {
                (Some((bid, _)), Some((ask, _))) => ask.inner() - bid.inner(),
                _ => Decimal::ZERO,
            };

            for (side, levels) in [(Side::Yes, &book.yes), (Side::No, &book.no)] {
                let Some((best_price, amount_needed, best_size, coverage)) =
                    analyze_side(levels, program.target_size)
                else {
                    continue;
                };
                // Target already covered on this side; nothing to add.
                if amount_needed == 0 {
                    continue;
                }
                let mut candidate = DiscoveryCandidate {
                    ticker: ticker.clone(),
                    side,
                    target_size: program.target_size,
                    best_price,
                    amount_needed,
                    best_size,
                    coverage,
                    spread,
                    discount_factor: program.discount_factor,
                    reward_pool: program.reward,
                    end_ts: program.end_ts,
                    score: 0,
                };
                candidate.score = score_candidate(&candidate, now);
                match best_by_ticker.get(&ticker) {
                    Some(existing) if existing.score >= candidate.score => {}
                    _ => {
                        best_by_ticker.insert(ticker.clone(), candidate);
                    }
                }
            }
        }

        let mut candidates: Vec<DiscoveryCandidate> = best_by_ticker.into_values().collect();
        candidates.sort_by(|a, b| b.score.cmp(&a.score));
        candidates
    }
}
