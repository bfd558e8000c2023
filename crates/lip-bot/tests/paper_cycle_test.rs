//! End-to-end paper-mode tests.
//!
//! Drive the full application loop against the in-memory exchange:
//! - Discovery finds a rewarded market and the processor quotes it
//! - An open breaker halts order flow until shutdown

use chrono::{Duration as ChronoDuration, Utc};
use lip_bot::{AppConfig, Application};
use lip_core::{Action, LiquidityProgram, OrderBook, Price, Ticker, Touch};
use lip_exchange::{ApiError, MockTradingApi, TradingApi};
use lip_feed::NoAuth;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    // Nothing listens here; the fill stream just keeps retrying.
    config.feed.url = "ws://127.0.0.1:59999".to_string();
    config.orchestration.loop_period_ms = 50;
    config
}

/// One rewarded market with a wide two-level book, far from both
/// resolution and expiry.
fn stage_market(api: &MockTradingApi, ticker: &Ticker) {
    api.set_programs(vec![LiquidityProgram {
        ticker: ticker.clone(),
        target_size: 300,
        reward: dec!(100),
        start_ts: Some(Utc::now() - ChronoDuration::days(2)),
        end_ts: Some(Utc::now() + ChronoDuration::days(20)),
        discount_factor: dec!(0.5),
    }]);
    api.set_touch(
        ticker,
        Touch::new(Price::tick(dec!(0.40)), Price::tick(dec!(0.46))),
    );
    api.set_book(
        ticker,
        OrderBook {
            yes: vec![(Price::tick(dec!(0.40)), 150), (Price::tick(dec!(0.38)), 200)],
            no: vec![(Price::tick(dec!(0.54)), 150), (Price::tick(dec!(0.52)), 200)],
        },
    );
    api.set_last_price(ticker, dec!(0.45));
    api.set_balance(dec!(1000));
}

fn spawn_app(
    config: AppConfig,
    api: Arc<MockTradingApi>,
) -> (
    Arc<Application>,
    tokio_util::sync::CancellationToken,
    tokio::task::JoinHandle<lip_bot::AppResult<()>>,
) {
    let app = Arc::new(Application::new(
        config,
        api as Arc<dyn TradingApi>,
        Arc::new(NoAuth),
    ));
    let cancel = app.cancellation_token();
    let runner = tokio::spawn({
        let app = Arc::clone(&app);
        async move { app.run().await }
    });
    (app, cancel, runner)
}

/// The loop discovers the rewarded market and places an opening bid
/// without any manual tracking.
#[tokio::test]
async fn test_paper_loop_discovers_and_quotes() {
    let api = Arc::new(MockTradingApi::new());
    let ticker = Ticker::new("PAPER-MKT");
    stage_market(&api, &ticker);

    let (_app, cancel, runner) = spawn_app(fast_config(), Arc::clone(&api));

    // Wait for the first quote (with timeout).
    let quoted = timeout(Duration::from_secs(3), async {
        loop {
            if !api.placed_orders().is_empty() {
                return;
            }
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(quoted.is_ok(), "should quote within timeout");

    let placed = api.placed_orders();
    assert_eq!(placed[0].ticker, ticker);
    assert_eq!(placed[0].action, Action::Buy);
    assert!(placed[0].price.inner() < dec!(0.46));

    // Cleanup: request shutdown and verify the loop exits cleanly.
    cancel.cancel();
    let joined = timeout(Duration::from_secs(10), runner)
        .await
        .expect("loop should stop after cancellation");
    joined.expect("runner task").expect("clean shutdown");
}

/// One rejected order against a one-error budget opens the breaker;
/// the loop then stops sending orders entirely, even though the
/// injected failure was one-shot.
#[tokio::test]
async fn test_breaker_open_halts_order_flow() {
    let api = Arc::new(MockTradingApi::new());
    let ticker = Ticker::new("HALT-MKT");
    stage_market(&api, &ticker);
    api.fail_next_place(ApiError::Transport("connection reset".to_string()));

    let mut config = fast_config();
    config.breaker.max_consecutive_errors = 1;

    let (_app, cancel, runner) = spawn_app(config, Arc::clone(&api));

    // Several loop periods worth of chances to quote.
    sleep(Duration::from_millis(400)).await;
    assert!(
        api.placed_orders().is_empty(),
        "open breaker must block order flow"
    );

    cancel.cancel();
    let joined = timeout(Duration::from_secs(10), runner)
        .await
        .expect("loop should stop after cancellation");
    joined.expect("runner task").expect("clean shutdown");
}
