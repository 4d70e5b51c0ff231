//! Full trading-day replay.
//!
//! Walks a `ManualClock` across a session in five-minute steps with a
//! scripted watch-list and checks what the query façade exposes at each
//! point.

use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use std::sync::Arc;

use breakout_scanner::config::{BtstConfig, ScannerConfig};
use breakout_scanner::engine::{ScanPhase, ScanQuery, ScanState, Scanner, TickReport};
use breakout_scanner::market::clock::{in_btst_window, in_market_hours};
use breakout_scanner::market::{Clock, ManualClock};
use breakout_scanner::types::{Direction, ExchangeTime, Symbol};

use crate::mock_source::{ist, MockSource, SymbolTape};

fn trading_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

const WATCHLIST: [&str; 5] = ["RUN.NS", "DIP.NS", "FLAT.NS", "SURGE.NS", "QUIET.NS"];

struct Harness {
    clock: Arc<ManualClock>,
    source: Arc<MockSource>,
    state: Arc<ScanState>,
    scanner: Scanner,
    query: ScanQuery,
}

impl Harness {
    fn new(day: NaiveDate) -> Self {
        let clock = Arc::new(ManualClock::new(ist(day, 9, 0, 0)));
        let source = Arc::new(MockSource::new(clock.clone()));
        load_day(&source, day);

        let state = Arc::new(ScanState::new());
        let cfg = ScannerConfig {
            watchlist: WATCHLIST.iter().map(|s| s.to_string()).collect(),
            ..ScannerConfig::default()
        };
        let scanner = Scanner::new(
            source.clone(),
            state.clone(),
            clock.clone(),
            &cfg,
            &BtstConfig::default(),
        );
        let query = ScanQuery::new(state.clone(), clock.clone());

        Self { clock, source, state, scanner, query }
    }

    async fn tick_at(&mut self, now: ExchangeTime) -> TickReport {
        self.clock.set(now);
        self.scanner.run_tick(now).await
    }
}

fn load_day(source: &MockSource, day: NaiveDate) {
    // Breaks up at 10:00, drifts back inside the range at 12:00
    source.set_tape(
        "RUN.NS",
        SymbolTape::session(
            day,
            100.0,
            98.0,
            |t| if t < hm(10, 0) { 99.0 } else if t < hm(12, 0) { 101.0 } else { 99.5 },
            10_000,
        )
        .with_daily(day, 80.0, 120.0, 1_000_000),
    );
    // Breaks down at 11:00
    source.set_tape(
        "DIP.NS",
        SymbolTape::session(day, 100.0, 98.0, |t| if t < hm(11, 0) { 99.0 } else { 97.0 }, 10_000)
            .with_daily(day, 80.0, 120.0, 1_000_000),
    );
    source.set_tape(
        "FLAT.NS",
        SymbolTape::session(day, 100.0, 98.0, |_| 99.0, 10_000)
            .with_daily(day, 80.0, 120.0, 1_000_000),
    );
    // Sits 0.92% under resistance with 100k shares per closing bar
    source.set_tape(
        "SURGE.NS",
        SymbolTape::session(day, 109.5, 108.5, |_| 109.0, 100_000)
            .with_daily(day, 100.0, 110.0, 1_000_000),
    );
    // Same levels, no volume
    source.set_tape(
        "QUIET.NS",
        SymbolTape::session(day, 109.5, 108.5, |_| 109.0, 10_000)
            .with_daily(day, 100.0, 110.0, 1_000_000),
    );
}

#[tokio::test]
async fn test_full_trading_day() {
    let day = trading_day();
    let mut h = Harness::new(day);
    let run = Symbol::from("RUN.NS");
    let dip = Symbol::from("DIP.NS");
    let flat = Symbol::from("FLAT.NS");
    let surge = Symbol::from("SURGE.NS");
    let quiet = Symbol::from("QUIET.NS");

    let mut t = ist(day, 9, 0, 0);
    let end = ist(day, 15, 45, 0);
    while t <= end {
        let report = h.tick_at(t).await;
        let breakouts = h.query.get_breakout_snapshot().await;
        let btst = h.query.get_btst_snapshot().await;

        // Invariants that hold on every tick
        if !in_market_hours(&t) {
            assert_eq!(report.phase, ScanPhase::Idle);
            assert!(breakouts.is_empty(), "breakouts served at {t}");
            assert!(h.state.breakouts.is_empty().await);
        }
        if !in_btst_window(&t) {
            assert!(btst.is_empty(), "btst served at {t}");
            assert!(h.state.btst.is_empty().await);
        }
        for rec in btst.values() {
            assert!(rec.resistance >= rec.support);
            assert!(rec.trailing_30min_volume as f64 >= 0.15 * rec.avg_daily_volume as f64);
        }
        for rec in breakouts.values() {
            assert_eq!(rec.trading_day, day);
            if let Some(first) = rec.first_breakout_time {
                assert!(first <= rec.last_update_time);
            }
        }
        assert!(!btst.contains_key(&quiet), "QUIET qualified at {t}");

        // Checkpoints
        match ((t.hour(), t.minute()), report.phase) {
            ((9, 0), phase) => {
                assert_eq!(phase, ScanPhase::Idle);
                assert_eq!(h.source.fetch_count(), 0);
            }
            ((9, 15), _) => {
                assert_eq!(breakouts.len(), 5);
                assert!(breakouts.values().all(|r| r.direction == Direction::Neutral));
                assert_eq!(breakouts[&run].opening_range.high, 100.0);
                assert_eq!(breakouts[&run].opening_range.low, 98.0);
            }
            ((10, 0), _) => {
                assert_eq!(breakouts[&run].direction, Direction::Bullish);
                assert_eq!(breakouts[&run].first_breakout_time, Some(t));
                assert_eq!(breakouts[&dip].direction, Direction::Neutral);
            }
            ((11, 0), _) => {
                assert_eq!(breakouts[&dip].direction, Direction::Bearish);
                assert_eq!(breakouts[&dip].first_breakout_time, Some(t));
            }
            ((12, 0), _) => {
                // Back inside the range, first breakout time kept
                assert_eq!(breakouts[&run].direction, Direction::Neutral);
                assert_eq!(breakouts[&run].first_breakout_time, Some(ist(day, 10, 0, 0)));
                assert_eq!(breakouts[&flat].first_breakout_time, None);
            }
            ((15, 0), phase) => {
                assert_eq!(phase, ScanPhase::BtstScanning);
                // One closing bar so far: 100k < 15% of 1M
                assert!(btst.is_empty());
            }
            ((15, 5), _) => {
                let rec = &btst[&surge];
                assert_eq!(rec.near_breakout_direction, Direction::Bullish);
                assert_eq!(rec.breakout_proximity_pct, 0.92);
                assert_eq!(rec.trailing_30min_volume, 200_000);
                assert_eq!(rec.volume_ratio, 20.0);
                assert_eq!(rec.support, 100.0);
                assert_eq!(rec.resistance, 110.0);
                assert_eq!(btst.len(), 1);
            }
            ((15, 30), _) => {
                assert_eq!(btst[&surge].trailing_30min_volume, 600_000);
                assert_eq!(btst[&surge].volume_ratio, 60.0);
                assert_eq!(breakouts.len(), 5);
            }
            ((15, 35), phase) => {
                assert_eq!(phase, ScanPhase::Idle);
            }
            _ => {}
        }

        t = t + Duration::minutes(5);
    }

    let last = h.query.last_tick().await.unwrap();
    assert_eq!(last.phase, ScanPhase::Idle);
    assert_eq!(last.started_at, end);
}

#[tokio::test]
async fn test_source_outage_keeps_last_records() {
    let day = trading_day();
    let mut h = Harness::new(day);
    let run = Symbol::from("RUN.NS");

    h.tick_at(ist(day, 10, 30, 0)).await;
    let before = h.query.get_breakout_snapshot().await;
    assert_eq!(before[&run].last_update_time, ist(day, 10, 30, 0));

    h.source.set_error("HTTP 503");
    let report = h.tick_at(ist(day, 10, 35, 0)).await;
    assert_eq!(report.skipped, WATCHLIST.len());
    assert_eq!(report.breakout_updated, 0);
    assert_eq!(h.query.get_breakout_snapshot().await, before);

    h.source.clear_error();
    let report = h.tick_at(ist(day, 10, 40, 0)).await;
    assert_eq!(report.breakout_updated, WATCHLIST.len());
    let after = h.query.get_breakout_snapshot().await;
    assert_eq!(after[&run].last_update_time, ist(day, 10, 40, 0));
    assert_eq!(after[&run].first_breakout_time, before[&run].first_breakout_time);
}

#[tokio::test]
async fn test_btst_outage_keeps_last_candidate() {
    let day = trading_day();
    let mut h = Harness::new(day);
    let surge = Symbol::from("SURGE.NS");

    h.tick_at(ist(day, 15, 10, 0)).await;
    let before = h.query.get_btst_snapshot().await;
    assert!(before.contains_key(&surge));

    h.source.set_error("timeout upstream");
    h.tick_at(ist(day, 15, 15, 0)).await;
    assert_eq!(h.query.get_btst_snapshot().await, before);
}

#[tokio::test]
async fn test_day_rollover_recomputes_opening_range() {
    let day = trading_day();
    let mut h = Harness::new(day);
    let run = Symbol::from("RUN.NS");

    h.tick_at(ist(day, 10, 0, 0)).await;
    let first = h.state.breakouts.get(&run).await.unwrap();
    assert_eq!(first.direction, Direction::Bullish);

    // Next session opens higher and stays inside its own range. No idle
    // tick in between, so the old record is still in the store.
    let next = day + Duration::days(1);
    h.source.set_tape(
        "RUN.NS",
        SymbolTape::session(next, 105.0, 103.0, |_| 104.0, 10_000)
            .with_daily(next, 80.0, 120.0, 1_000_000),
    );
    h.tick_at(ist(next, 10, 0, 0)).await;

    let rec = h.state.breakouts.get(&run).await.unwrap();
    assert_eq!(rec.trading_day, next);
    assert_eq!(rec.opening_range.high, 105.0);
    assert_eq!(rec.opening_range.low, 103.0);
    assert_eq!(rec.direction, Direction::Neutral);
    assert_eq!(rec.first_breakout_time, None);
}

#[tokio::test]
async fn test_symbol_missing_from_source_is_skipped() {
    let day = trading_day();
    let clock = Arc::new(ManualClock::new(ist(day, 11, 0, 0)));
    let source = Arc::new(MockSource::new(clock.clone()));
    load_day(&source, day);

    let state = Arc::new(ScanState::new());
    let cfg = ScannerConfig {
        watchlist: vec!["RUN.NS".into(), "DELISTED.NS".into()],
        ..ScannerConfig::default()
    };
    let mut scanner = Scanner::new(source, state.clone(), clock.clone(), &cfg, &BtstConfig::default());

    let report = scanner.run_tick(clock.now()).await;
    assert_eq!(report.breakout_updated, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert!(state.breakouts.get(&Symbol::from("DELISTED.NS")).await.is_none());
}

#[tokio::test]
async fn test_run_loop_ticks_then_stops() {
    let day = trading_day();
    let h = Harness::new(day);
    h.clock.set(ist(day, 10, 15, 0));
    let query = h.query.clone();

    h.scanner
        .run(tokio::time::sleep(std::time::Duration::from_millis(200)))
        .await;

    let last = query.last_tick().await.unwrap();
    assert_eq!(last.phase, ScanPhase::MarketScanning);
    assert_eq!(last.started_at, ist(day, 10, 15, 0));
    assert_eq!(query.get_breakout_snapshot().await.len(), WATCHLIST.len());
}

#[tokio::test]
async fn test_btst_fires_on_weekday_only_history() {
    let day = trading_day();
    let clock = Arc::new(ManualClock::new(ist(day, 15, 25, 0)));
    let source = Arc::new(MockSource::new(clock.clone()));
    source.set_tape(
        "WEEKDAY.NS",
        SymbolTape::session(day, 109.5, 108.5, |_| 109.0, 100_000)
            .with_weekday_daily(day, 40, 100.0, 110.0, 1_000_000),
    );

    let state = Arc::new(ScanState::new());
    let cfg = ScannerConfig {
        watchlist: vec!["WEEKDAY.NS".into()],
        ..ScannerConfig::default()
    };
    let mut scanner = Scanner::new(
        source.clone(),
        state.clone(),
        clock.clone(),
        &cfg,
        &BtstConfig::default(),
    );

    let report = scanner.run_tick(clock.now()).await;
    assert_eq!(source.last_daily_request(), Some(20));
    assert_eq!(report.btst_qualified, 1);

    let rec = state.btst.get(&Symbol::from("WEEKDAY.NS")).await.unwrap();
    // The spike 26 sessions back is outside the 20-session window
    assert_eq!(rec.resistance, 110.0);
    assert_eq!(rec.support, 100.0);
    assert_eq!(rec.breakout_proximity_pct, 0.92);
    assert_eq!(rec.volume_ratio, 60.0);
}
