//! Trading Engine Integration Tests
//!
//! End-to-end scenarios driving the full position lifecycle through the
//! TradingEngine: watch -> entry -> staged exits -> terminal close, plus
//! journal persistence across restarts. All tests are deterministic (no
//! real clocks, no network) and use explicit timestamps.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use mintwatch::application::TradingEngine;
use mintwatch::config::Config;
use mintwatch::domain::{
    ChannelSink, EntryOutcome, EntryStrategy, ExitReason, JournalStore, JsonJournal,
    PositionEvent, PositionStatus, PriceTick, Recommendation, Signal, SocialSignals,
    TokenCategory, TokenFeatures, WatchOutcome,
};
use mintwatch::domain::signal::{Confidence, DevRisk};
use tempfile::TempDir;

// ============================================================================
// Test Fixtures
// ============================================================================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn tick(mint: &str, price: f64, at: DateTime<Utc>) -> PriceTick {
    PriceTick {
        mint: mint.to_string(),
        price,
        timestamp: at,
    }
}

/// HIGH-confidence tech signal matching the canonical risk scenario
fn tech_signal(mint: &str) -> Signal {
    Signal {
        mint: mint.to_string(),
        symbol: "TECH".to_string(),
        recommendation: Recommendation::Buy,
        confidence: Confidence::High,
        risk_score: 2,
        predicted_return: 0.8,
        token_category: TokenCategory::Tech,
        dev_risk: Some(DevRisk::Low),
        volatility_multiplier: 1.0,
    }
}

/// MEDIUM-confidence signal whose default stop lands exactly at 15%
fn medium_signal(mint: &str) -> Signal {
    Signal {
        mint: mint.to_string(),
        symbol: "MED".to_string(),
        recommendation: Recommendation::Buy,
        confidence: Confidence::Medium,
        risk_score: 2,
        predicted_return: 0.5,
        token_category: TokenCategory::Unknown,
        dev_risk: None,
        volatility_multiplier: 1.0,
    }
}

/// Features that classify viral with enough liquidity for an immediate entry
fn viral_features() -> TokenFeatures {
    TokenFeatures {
        scan_velocity: 150.0,
        social_momentum: 10.0,
        time_on_curve_hours: 1.0,
        unique_wallets: 500,
        initial_liquidity_sol: 30.0,
    }
}

/// Features that classify tech with a pool thin enough to expect a dump
fn thin_tech_features() -> TokenFeatures {
    TokenFeatures {
        scan_velocity: 20.0,
        social_momentum: 1.0,
        time_on_curve_hours: 18.0,
        unique_wallets: 250,
        initial_liquidity_sol: 5.0,
    }
}

fn engine_at(dir: &TempDir) -> TradingEngine {
    let config = Config::default();
    let journal = JsonJournal::new(dir.path().join("journal.json"));
    TradingEngine::new(&config, Box::new(journal))
}

/// Watch and immediately fill a full position at the given price
async fn open_full(engine: &TradingEngine, signal: &Signal, price: f64, at: DateTime<Utc>) {
    let outcome = engine
        .watch(signal, &viral_features(), &SocialSignals::default(), at)
        .await;
    assert!(matches!(outcome, WatchOutcome::Watching { .. }));
    engine.enter(&signal.mint, price, 1.0, at).await;
}

async fn assert_capital_reconciles(engine: &TradingEngine) {
    let summary = engine.performance_summary().await;
    let expected = summary.initial_capital + summary.total_pnl;
    assert!(
        (summary.current_capital - expected).abs() < 1e-6,
        "capital {} != initial {} + pnl {}",
        summary.current_capital,
        summary.initial_capital,
        summary.total_pnl
    );
}

// ============================================================================
// Canonical lifecycle scenarios
// ============================================================================

/// Entry 1.0, HIGH confidence, risk 2, tech, clean dev: the stop lands in
/// the 9-12% discount band; prices [1.0, 1.2, 1.5, 1.8] fire the first
/// take-profit stage at 1.5 and latch the trailing stop with the HIGH trail.
#[tokio::test]
async fn canonical_tech_run_fires_first_stage_and_trailing_latch() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(&dir);

    open_full(&engine, &tech_signal("mint1"), 1.0, t0()).await;

    let position = engine.position("mint1").await.unwrap();
    assert_eq!(position.status, PositionStatus::Open);
    // 15% base * 0.8 HIGH * 0.9 tech = 10.8% discount
    let stop_loss = position.stop_loss.unwrap();
    assert!(
        stop_loss >= 0.88 && stop_loss <= 0.91,
        "stop loss {} outside the 9-12% discount band",
        stop_loss
    );

    for price in [1.0, 1.2] {
        let report = engine.update(&tick("mint1", price, t0())).await;
        assert!(report.partial_exits.is_empty());
        assert!(report.closed.is_none());
    }

    let report = engine.update(&tick("mint1", 1.5, t0())).await;
    assert_eq!(report.partial_exits.len(), 1);
    assert_eq!(report.partial_exits[0].stage, "First Target");
    // 50% gain on 30% of the $900 position
    assert!((report.partial_exits[0].pnl - 135.0).abs() < 1e-9);

    let position = engine.position("mint1").await.unwrap();
    assert!(position.trailing_active);
    assert_eq!(position.peak_price, Some(1.5));

    let report = engine.update(&tick("mint1", 1.8, t0())).await;
    assert!(report.partial_exits.is_empty());
    let position = engine.position("mint1").await.unwrap();
    assert_eq!(position.peak_price, Some(1.8));
    // HIGH trail distance is 15% below the peak
    assert!((position.trailing_price.unwrap() - 1.53).abs() < 1e-9);

    // Partial exits accrue on the position, not on capital
    assert_capital_reconciles(&engine).await;
}

/// Entry 1.0 with the default MEDIUM stop at 0.85: prices [1.0, 0.9, 0.84]
/// close the position at the stop with a realized loss.
#[tokio::test]
async fn stop_loss_scenario_closes_with_loss() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(&dir);

    open_full(&engine, &medium_signal("mint1"), 1.0, t0()).await;

    let position = engine.position("mint1").await.unwrap();
    assert!((position.stop_loss.unwrap() - 0.85).abs() < 1e-9);

    for price in [1.0, 0.9] {
        let report = engine.update(&tick("mint1", price, t0())).await;
        assert!(report.closed.is_none());
    }

    let report = engine.update(&tick("mint1", 0.84, t0())).await;
    let closed = report.closed.unwrap();
    assert_eq!(closed.reason, ExitReason::StopLoss);
    // 16% loss on the $540 MEDIUM-sized position
    assert!((closed.realized_pnl + 86.4).abs() < 1e-9);

    let summary = engine.performance_summary().await;
    assert_eq!(summary.total_trades, 1);
    assert_eq!(summary.losing_trades, 1);
    assert_eq!(summary.winning_trades, 0);
    assert!(engine.position("mint1").await.is_none());
    assert_capital_reconciles(&engine).await;
}

/// A watched position with a 0.5h immediate window and no fill expires one
/// hour later with zero capital effect.
#[tokio::test]
async fn unfilled_watch_expires_without_capital_effect() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(&dir);

    let outcome = engine
        .watch(
            &tech_signal("mint1"),
            &viral_features(),
            &SocialSignals::default(),
            t0(),
        )
        .await;
    match outcome {
        WatchOutcome::Watching { strategy, .. } => assert_eq!(strategy, EntryStrategy::Immediate),
        other => panic!("unexpected outcome {:?}", other),
    }

    let reports = engine.sweep_expired(t0() + Duration::hours(1)).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].reason, ExitReason::Expired);
    assert_eq!(reports[0].realized_pnl, 0.0);

    let summary = engine.performance_summary().await;
    assert_eq!(summary.total_trades, 0);
    assert!((summary.current_capital - summary.initial_capital).abs() < 1e-12);
    assert!(engine.position("mint1").await.is_none());
}

/// The trailing stop settles the remainder after the ladder sold its
/// stages; partial exits plus the remainder cover the whole position.
#[tokio::test]
async fn trailing_exit_after_partial_stages_covers_full_size() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(&dir);

    open_full(&engine, &tech_signal("mint1"), 1.0, t0()).await;

    engine.update(&tick("mint1", 1.5, t0())).await;
    engine.update(&tick("mint1", 2.2, t0())).await;

    // Peak 2.2 with the HIGH 15% trail puts the trailing stop at 1.87
    let report = engine.update(&tick("mint1", 1.8, t0())).await;
    let closed = report.closed.unwrap();
    assert_eq!(closed.reason, ExitReason::TrailingStop);
    assert!(closed.realized_pnl > 0.0);

    let position = engine.position("mint1").await;
    assert!(position.is_none());

    let summary = engine.performance_summary().await;
    assert_eq!(summary.winning_trades, 1);
    assert_capital_reconciles(&engine).await;
}

/// A gap-down through both the trailing stop and the regular stop-loss
/// exits at the trailing variant: the trailing check runs first.
#[tokio::test]
async fn gap_down_exits_at_trailing_stop_not_regular() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(&dir);

    open_full(&engine, &tech_signal("mint1"), 1.0, t0()).await;
    engine.update(&tick("mint1", 1.5, t0())).await;

    let report = engine.update(&tick("mint1", 0.5, t0())).await;
    assert_eq!(report.closed.unwrap().reason, ExitReason::TrailingStop);
}

/// A gap straight through every take-profit threshold fires the whole
/// ladder on one tick and closes the position at all-targets-hit.
#[tokio::test]
async fn gap_through_whole_ladder_closes_all_targets_hit() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(&dir);

    open_full(&engine, &tech_signal("mint1"), 1.0, t0()).await;

    let report = engine.update(&tick("mint1", 3.5, t0())).await;
    assert_eq!(report.partial_exits.len(), 3);
    assert_eq!(report.closed.unwrap().reason, ExitReason::AllTargetsHit);

    let sold: f64 = report.partial_exits.iter().map(|e| e.size_pct).sum();
    assert!(sold <= 1.0);
    assert!((sold - 0.8).abs() < 1e-9);
    assert_capital_reconciles(&engine).await;
}

// ============================================================================
// Entry scheduling through the engine
// ============================================================================

/// Thin-liquidity tech tokens wait for the post-migration dump: the entry
/// fires only once price retraces 5% from the running high.
#[tokio::test]
async fn wait_for_dip_entry_fills_on_retrace() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(&dir);

    let signal = tech_signal("mint1");
    let outcome = engine
        .watch(&signal, &thin_tech_features(), &SocialSignals::default(), t0())
        .await;
    match outcome {
        WatchOutcome::Watching { strategy, .. } => {
            assert_eq!(strategy, EntryStrategy::WaitForDip)
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    // Seed the high, climb, then a shallow retrace: still waiting
    for price in [1.0, 1.2, 1.17] {
        let outcome = engine.check_entry("mint1", price, None, t0()).await;
        assert_eq!(outcome, EntryOutcome::Waiting);
    }

    // Past 5% off the 1.2 high fills the position
    let outcome = engine.check_entry("mint1", 1.13, None, t0()).await;
    assert!(matches!(outcome, EntryOutcome::Entered(_)));

    let position = engine.position("mint1").await.unwrap();
    assert_eq!(position.status, PositionStatus::Open);
    assert_eq!(position.entry_price, Some(1.13));
}

/// Laddered entries take the first tranche immediately and the remainder
/// only on volume confirmation; the entry price stays at the first fill.
#[tokio::test]
async fn ladder_entry_completes_on_volume_confirmation() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(&dir);

    let mut signal = tech_signal("mint1");
    signal.confidence = Confidence::Medium; // viral + medium confidence ladders

    engine
        .watch(&signal, &viral_features(), &SocialSignals::default(), t0())
        .await;

    let outcome = engine.check_entry("mint1", 1.0, None, t0()).await;
    assert!(matches!(outcome, EntryOutcome::Entered(_)));
    let position = engine.position("mint1").await.unwrap();
    assert!((position.entry_filled_pct - 0.5).abs() < 1e-12);

    // Weak volume holds, confirmed volume completes the fill
    let outcome = engine.check_entry("mint1", 1.1, Some(1.2), t0()).await;
    assert_eq!(outcome, EntryOutcome::Waiting);

    let outcome = engine.check_entry("mint1", 1.1, Some(2.0), t0()).await;
    assert!(matches!(outcome, EntryOutcome::Entered(_)));

    let position = engine.position("mint1").await.unwrap();
    assert!((position.entry_filled_pct - 1.0).abs() < 1e-12);
    assert_eq!(position.entry_price, Some(1.0));
}

/// An elapsed entry window surfaces as Expired from the entry check itself.
#[tokio::test]
async fn check_entry_reports_expiry_instead_of_entering() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(&dir);

    engine
        .watch(
            &tech_signal("mint1"),
            &viral_features(),
            &SocialSignals::default(),
            t0(),
        )
        .await;

    let outcome = engine
        .check_entry("mint1", 1.0, None, t0() + Duration::hours(1))
        .await;
    match outcome {
        EntryOutcome::Expired(report) => {
            assert_eq!(report.reason, ExitReason::Expired);
            assert_eq!(report.realized_pnl, 0.0);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

// ============================================================================
// Ledger invariants across mixed activity
// ============================================================================

/// Non-BUY signals and duplicate watches never create positions.
#[tokio::test]
async fn watch_rejections_leave_no_state() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(&dir);

    let mut hold = tech_signal("mint1");
    hold.recommendation = Recommendation::Hold;
    let outcome = engine
        .watch(&hold, &viral_features(), &SocialSignals::default(), t0())
        .await;
    assert_eq!(outcome, WatchOutcome::RejectedNotBuy);
    assert!(engine.position("mint1").await.is_none());

    let signal = tech_signal("mint2");
    engine
        .watch(&signal, &viral_features(), &SocialSignals::default(), t0())
        .await;
    let outcome = engine
        .watch(&signal, &viral_features(), &SocialSignals::default(), t0())
        .await;
    assert_eq!(outcome, WatchOutcome::RejectedDuplicate);
}

/// Capital reconciles after every operation across a mixed run of wins,
/// losses, expiries and manual closes on independent tokens.
#[tokio::test]
async fn capital_reconciles_across_mixed_run() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(&dir);

    // Win on mint1
    open_full(&engine, &tech_signal("mint1"), 1.0, t0()).await;
    engine.update(&tick("mint1", 1.5, t0())).await;
    assert_capital_reconciles(&engine).await;
    engine
        .close("mint1", 1.4, ExitReason::Manual, t0())
        .await
        .unwrap();
    assert_capital_reconciles(&engine).await;

    // Loss on mint2
    open_full(&engine, &medium_signal("mint2"), 1.0, t0()).await;
    engine.update(&tick("mint2", 0.84, t0())).await;
    assert_capital_reconciles(&engine).await;

    // Expiry on mint3, no capital effect
    engine
        .watch(
            &tech_signal("mint3"),
            &viral_features(),
            &SocialSignals::default(),
            t0(),
        )
        .await;
    engine.sweep_expired(t0() + Duration::hours(2)).await;
    assert_capital_reconciles(&engine).await;

    // Watch-then-close without an entry, no capital effect
    engine
        .watch(
            &tech_signal("mint4"),
            &viral_features(),
            &SocialSignals::default(),
            t0(),
        )
        .await;
    engine.close("mint4", 9.0, ExitReason::Manual, t0()).await;
    assert_capital_reconciles(&engine).await;

    let summary = engine.performance_summary().await;
    assert_eq!(summary.total_trades, 2);
    assert_eq!(summary.winning_trades, 1);
    assert_eq!(summary.losing_trades, 1);
    assert!((summary.win_rate - 0.5).abs() < 1e-12);
    assert_eq!(summary.active_positions, 0);
}

/// A stale repeated tick neither double-fires a stage nor re-closes.
#[tokio::test]
async fn repeated_tick_has_no_double_effect() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(&dir);

    open_full(&engine, &tech_signal("mint1"), 1.0, t0()).await;

    let first = engine.update(&tick("mint1", 1.5, t0())).await;
    assert_eq!(first.partial_exits.len(), 1);

    let second = engine.update(&tick("mint1", 1.5, t0())).await;
    assert!(second.partial_exits.is_empty());
    assert!(second.closed.is_none());

    let position = engine.position("mint1").await.unwrap();
    assert_eq!(position.partial_exits.len(), 1);
}

// ============================================================================
// Event stream
// ============================================================================

/// The event stream sees the lifecycle in order: opened, each partial
/// exit, then closed.
#[tokio::test]
async fn event_stream_orders_lifecycle() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(&dir);

    let (sink, mut rx) = ChannelSink::new();
    engine.add_sink(Arc::new(sink)).await;

    open_full(&engine, &tech_signal("mint1"), 1.0, t0()).await;
    engine.update(&tick("mint1", 1.5, t0())).await;
    engine.update(&tick("mint1", 3.5, t0())).await;

    let event = rx.recv().await.unwrap();
    assert!(matches!(event, PositionEvent::Opened { .. }));

    let mut partials = 0;
    loop {
        match rx.recv().await.unwrap() {
            PositionEvent::PartialExit { stage, .. } => {
                partials += 1;
                assert!(!stage.is_empty());
            }
            PositionEvent::Closed { reason, .. } => {
                assert_eq!(reason, ExitReason::AllTargetsHit);
                break;
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
    assert_eq!(partials, 3);
}

// ============================================================================
// Journal persistence
// ============================================================================

/// Restarting on the same journal restores capital and counters exactly
/// once; reload never double-counts realized PnL.
#[tokio::test]
async fn restart_restores_journal_without_double_counting() {
    let dir = TempDir::new().unwrap();

    {
        let engine = engine_at(&dir);
        open_full(&engine, &tech_signal("mint1"), 1.0, t0()).await;
        engine.update(&tick("mint1", 1.5, t0())).await;
        engine.update(&tick("mint1", 3.5, t0())).await;

        open_full(&engine, &medium_signal("mint2"), 1.0, t0()).await;
        engine.update(&tick("mint2", 0.8, t0())).await;
    }

    let reloaded = engine_at(&dir);
    let summary = reloaded.performance_summary().await;
    assert_eq!(summary.total_trades, 2);
    assert_eq!(summary.winning_trades, 1);
    assert_eq!(summary.losing_trades, 1);
    assert_capital_reconciles(&reloaded).await;

    // A second restart sees the identical state
    let again = engine_at(&dir);
    let summary2 = again.performance_summary().await;
    assert_eq!(summary2.total_trades, summary.total_trades);
    assert!((summary2.current_capital - summary.current_capital).abs() < 1e-9);
}

/// The journal record keeps the stable reporting field set for a closed
/// position: prices, timestamps, PnL, exit reason, classification inputs.
#[tokio::test]
async fn journal_record_carries_reporting_fields() {
    let dir = TempDir::new().unwrap();

    {
        let engine = engine_at(&dir);
        open_full(&engine, &tech_signal("mint1"), 1.0, t0()).await;
        engine.update(&tick("mint1", 1.5, t0())).await;
        engine
            .close("mint1", 1.4, ExitReason::Manual, t0() + Duration::hours(2))
            .await;
    }

    let journal = JsonJournal::new(dir.path().join("journal.json"));
    let snapshot = journal.load().unwrap().unwrap();
    assert_eq!(snapshot.closed_positions.len(), 1);

    let record = &snapshot.closed_positions[0];
    assert_eq!(record.mint, "mint1");
    assert_eq!(record.status, PositionStatus::ClosedManual);
    assert_eq!(record.exit_reason, Some(ExitReason::Manual));
    assert_eq!(record.entry_strategy, EntryStrategy::Immediate);
    assert_eq!(record.entry_price, Some(1.0));
    assert_eq!(record.exit_price, Some(1.4));
    assert_eq!(record.risk_score, 2);
    assert_eq!(record.partial_exits.len(), 1);
    assert!(record.entry_time.is_some());
    assert_eq!(record.exit_time, Some(t0() + Duration::hours(2)));

    // Sold fractions plus the remainder cover the original size exactly
    let sold: f64 = record.partial_exits.iter().map(|e| e.size_pct).sum();
    assert!(sold < 1.0);
    assert!((sold + (1.0 - sold) - 1.0).abs() < 1e-12);
}

/// A corrupt journal is reported and ignored at startup; the engine runs
/// with fresh state instead of refusing to start.
#[tokio::test]
async fn corrupt_journal_starts_fresh() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("journal.json"), "{ not json at all").unwrap();

    let engine = engine_at(&dir);
    let summary = engine.performance_summary().await;
    assert_eq!(summary.total_trades, 0);
    assert!((summary.current_capital - summary.initial_capital).abs() < 1e-12);

    // And the engine still trades and persists over the bad file
    open_full(&engine, &tech_signal("mint1"), 1.0, t0()).await;
    engine.close("mint1", 1.2, ExitReason::Manual, t0()).await;

    let reloaded = engine_at(&dir);
    assert_eq!(reloaded.performance_summary().await.total_trades, 1);
}
