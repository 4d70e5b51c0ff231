//! Scanner loop.
//!
//! Wakes on a fixed cadence, classifies the current time into trading
//! windows, and runs the active detectors over the watch-list in order.
//! Window membership is re-evaluated on every tick:
//!
//! - outside market hours the breakout map is cleared;
//! - outside the BTST window the BTST map is cleared;
//! - inside a window its detector runs for every symbol.
//!
//! A failure for one symbol is logged and the tick moves on. The loop is
//! the only writer to `ScanState`.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{BtstConfig, ScannerConfig};
use crate::data::MarketDataSource;
use crate::engine::breakout::BreakoutDetector;
use crate::engine::btst::BtstDetector;
use crate::engine::store::ScanState;
use crate::market::{Clock, MarketWindows};
use crate::types::{Bar, BarInterval, BtstRecord, ExchangeTime, ScanError, Symbol};

// ---------------------------------------------------------------------------
// Phase and tick report
// ---------------------------------------------------------------------------

/// Which detectors the current tick runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanPhase {
    /// Market closed: both maps empty.
    Idle,
    /// Breakout detector only.
    MarketScanning,
    /// Final half hour: breakout and BTST detectors.
    BtstScanning,
}

impl ScanPhase {
    pub fn from_windows(windows: &MarketWindows) -> Self {
        if windows.btst_window {
            ScanPhase::BtstScanning
        } else if windows.market_hours {
            ScanPhase::MarketScanning
        } else {
            ScanPhase::Idle
        }
    }
}

/// Outcome counts for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub phase: ScanPhase,
    pub started_at: ExchangeTime,
    /// Breakout records written.
    pub breakout_updated: usize,
    /// Symbols currently qualifying as BTST candidates.
    pub btst_qualified: usize,
    /// BTST records dropped because a condition stopped holding.
    pub btst_cleared: usize,
    /// Symbols skipped for expected reasons (no data, short history, …).
    pub skipped: usize,
    /// Symbols that failed unexpectedly.
    pub failed: usize,
}

impl TickReport {
    fn new(phase: ScanPhase, started_at: ExchangeTime) -> Self {
        Self {
            phase,
            started_at,
            breakout_updated: 0,
            btst_qualified: 0,
            btst_cleared: 0,
            skipped: 0,
            failed: 0,
        }
    }

    fn note_error(&mut self, detector: &str, err: &ScanError) {
        if err.is_skip() {
            self.skipped += 1;
            debug!(detector, error = %err, "Symbol skipped this tick");
        } else {
            self.failed += 1;
            warn!(detector, error = %err, "Symbol scan failed, continuing");
        }
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

pub struct Scanner {
    source: Arc<dyn MarketDataSource>,
    state: Arc<ScanState>,
    clock: Arc<dyn Clock>,
    watchlist: Vec<Symbol>,
    breakout: BreakoutDetector,
    btst: BtstDetector,
    interval: Duration,
    fetch_timeout: Duration,
    phase: ScanPhase,
}

impl Scanner {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        state: Arc<ScanState>,
        clock: Arc<dyn Clock>,
        scanner: &ScannerConfig,
        btst: &BtstConfig,
    ) -> Self {
        Self {
            source,
            state,
            clock,
            watchlist: scanner.symbols(),
            breakout: BreakoutDetector::new(),
            btst: BtstDetector::new(btst.clone()),
            interval: scanner.interval(),
            fetch_timeout: scanner.fetch_timeout(),
            phase: ScanPhase::Idle,
        }
    }

    /// Override the per-call data-source timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// Tick until `shutdown` resolves.
    ///
    /// Ticks never overlap: a slow tick pushes the next one back instead
    /// of queueing a burst. Shutdown is observed between ticks, so a tick
    /// already running completes first.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            source = self.source.name(),
            symbols = self.watchlist.len(),
            interval_secs = self.interval.as_secs(),
            "Scanner loop started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = self.clock.now();
                    self.run_tick(now).await;
                }
                _ = &mut shutdown => {
                    info!("Scanner loop stopping");
                    break;
                }
            }
        }
    }

    /// Run one tick as of `now`.
    pub async fn run_tick(&mut self, now: ExchangeTime) -> TickReport {
        let windows = MarketWindows::at(&now);
        let phase = ScanPhase::from_windows(&windows);
        if phase != self.phase {
            info!(from = ?self.phase, to = ?phase, at = %now.format("%H:%M:%S"), "Scanner phase changed");
            self.phase = phase;
        }

        let mut report = TickReport::new(phase, now);

        if windows.market_hours {
            self.scan_watchlist(now, windows.btst_window, &mut report).await;
        } else {
            let cleared = self.state.breakouts.remove_all().await;
            if cleared > 0 {
                info!(cleared, "Market closed, breakout map cleared");
            }
        }

        if !windows.btst_window {
            let cleared = self.state.btst.remove_all().await;
            if cleared > 0 {
                info!(cleared, "BTST window closed, BTST map cleared");
            }
        }

        if phase == ScanPhase::Idle {
            debug!("Idle tick");
        } else {
            info!(
                phase = ?phase,
                breakouts = report.breakout_updated,
                btst = report.btst_qualified,
                skipped = report.skipped,
                failed = report.failed,
                "Tick complete"
            );
        }

        self.state.record_tick(report.clone()).await;
        report
    }

    /// One pass over the watch-list. Intraday bars are fetched once per
    /// symbol and shared by both detectors.
    async fn scan_watchlist(&self, now: ExchangeTime, btst_window: bool, report: &mut TickReport) {
        for symbol in &self.watchlist {
            let session = self.fetch_session(symbol).await;

            match &session {
                Ok(bars) => self.scan_breakout(symbol, bars, now, report).await,
                Err(e) => report.note_error("breakout", e),
            }

            if btst_window {
                match &session {
                    Ok(bars) => self.scan_btst(symbol, bars, now, report).await,
                    Err(e) => report.note_error("btst", e),
                }
            }
        }
    }

    // -- Breakout --------------------------------------------------------

    async fn scan_breakout(
        &self,
        symbol: &Symbol,
        bars: &SessionBars,
        now: ExchangeTime,
        report: &mut TickReport,
    ) {
        let previous = self.state.breakouts.get(symbol).await;
        let evaluated = self.breakout.evaluate(
            symbol,
            previous.as_deref(),
            &bars.five_minute,
            &bars.one_minute,
            now,
        );

        match evaluated {
            Ok(record) => {
                if record.first_breakout_time == Some(now) {
                    info!(
                        symbol = %symbol,
                        direction = %record.direction,
                        price = record.current_price,
                        range_high = record.opening_range.high,
                        range_low = record.opening_range.low,
                        "Opening-range breakout"
                    );
                }
                self.state.breakouts.replace(symbol.clone(), record).await;
                report.breakout_updated += 1;
            }
            Err(e) => report.note_error("breakout", &e),
        }
    }

    // -- BTST ------------------------------------------------------------

    async fn scan_btst(
        &self,
        symbol: &Symbol,
        bars: &SessionBars,
        now: ExchangeTime,
        report: &mut TickReport,
    ) {
        match self.evaluate_btst(symbol, bars, now).await {
            Ok(Some(record)) => {
                debug!(
                    symbol = %symbol,
                    direction = %record.near_breakout_direction,
                    proximity_pct = record.breakout_proximity_pct,
                    volume_ratio = record.volume_ratio,
                    "BTST candidate"
                );
                self.state.btst.replace(symbol.clone(), record).await;
                report.btst_qualified += 1;
            }
            Ok(None) => {
                if self.state.btst.remove(symbol).await {
                    report.btst_cleared += 1;
                }
            }
            Err(e) => report.note_error("btst", &e),
        }
    }

    async fn evaluate_btst(
        &self,
        symbol: &Symbol,
        bars: &SessionBars,
        now: ExchangeTime,
    ) -> Result<Option<BtstRecord>, ScanError> {
        let daily = self.fetch_daily(symbol, self.btst.daily_lookback()).await?;
        self.btst
            .evaluate(symbol, &daily, &bars.five_minute, &bars.one_minute, now)
    }

    // -- Fetch helpers ---------------------------------------------------

    /// Today's 5-minute and 1-minute series. Only the 5-minute series is
    /// required.
    async fn fetch_session(&self, symbol: &Symbol) -> Result<SessionBars, ScanError> {
        let (five_minute, one_minute) = tokio::join!(
            self.fetch_intraday(symbol, BarInterval::FiveMinute),
            self.fetch_intraday(symbol, BarInterval::OneMinute),
        );
        Ok(SessionBars {
            five_minute: five_minute?,
            one_minute: fine_or_empty(symbol, one_minute),
        })
    }

    async fn fetch_intraday(
        &self,
        symbol: &Symbol,
        interval: BarInterval,
    ) -> Result<Vec<Bar>, ScanError> {
        tokio::time::timeout(self.fetch_timeout, self.source.fetch_intraday(symbol, interval))
            .await
            .map_err(|_| self.timeout_error(symbol))?
    }

    async fn fetch_daily(&self, symbol: &Symbol, sessions: u32) -> Result<Vec<Bar>, ScanError> {
        tokio::time::timeout(self.fetch_timeout, self.source.fetch_daily(symbol, sessions))
            .await
            .map_err(|_| self.timeout_error(symbol))?
    }

    fn timeout_error(&self, symbol: &Symbol) -> ScanError {
        ScanError::Timeout {
            symbol: symbol.clone(),
            secs: self.fetch_timeout.as_secs(),
        }
    }
}

struct SessionBars {
    five_minute: Vec<Bar>,
    one_minute: Vec<Bar>,
}

/// The 1-minute series only refines the price; losing it falls back to
/// the 5-minute close.
fn fine_or_empty(symbol: &Symbol, fetched: Result<Vec<Bar>, ScanError>) -> Vec<Bar> {
    fetched.unwrap_or_else(|e| {
        debug!(symbol = %symbol, error = %e, "1m series unavailable, using 5m close");
        Vec::new()
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
