//! Read-only view over the scan state.
//!
//! Snapshots are gated on the window flags computed fresh for each call,
//! so a stale record is never served after a window closes, even if the
//! scanner has not ticked since.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::scanner::TickReport;
use crate::engine::store::ScanState;
use crate::market::{Clock, MarketWindows};
use crate::types::{BreakoutRecord, BtstRecord, ExchangeTime, Symbol};

/// Window flags plus the exchange-local clock reading they were taken at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowStatus {
    pub in_market_hours: bool,
    pub in_opening_window: bool,
    pub in_btst_window: bool,
    /// `HH:MM:SS`
    pub current_time: String,
    /// `YYYY-MM-DD`
    pub current_date: String,
}

#[derive(Clone)]
pub struct ScanQuery {
    state: Arc<ScanState>,
    clock: Arc<dyn Clock>,
}

impl ScanQuery {
    pub fn new(state: Arc<ScanState>, clock: Arc<dyn Clock>) -> Self {
        Self { state, clock }
    }

    pub async fn get_breakout_snapshot(&self) -> BTreeMap<Symbol, BreakoutRecord> {
        if !MarketWindows::at(&self.clock.now()).market_hours {
            return BTreeMap::new();
        }
        self.state.breakouts.snapshot().await
    }

    pub async fn get_btst_snapshot(&self) -> BTreeMap<Symbol, BtstRecord> {
        if !MarketWindows::at(&self.clock.now()).btst_window {
            return BTreeMap::new();
        }
        self.state.btst.snapshot().await
    }

    pub fn get_window_status(&self, now: ExchangeTime) -> WindowStatus {
        let windows = MarketWindows::at(&now);
        WindowStatus {
            in_market_hours: windows.market_hours,
            in_opening_window: windows.opening_window,
            in_btst_window: windows.btst_window,
            current_time: now.format("%H:%M:%S").to_string(),
            current_date: now.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn window_status(&self) -> WindowStatus {
        self.get_window_status(self.clock.now())
    }

    pub async fn last_tick(&self) -> Option<TickReport> {
        self.state.last_tick().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
