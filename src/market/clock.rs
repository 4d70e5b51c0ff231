//! Trading-window classification.
//!
//! Pure functions mapping an exchange-local timestamp to the named NSE
//! session windows. Market hours and the BTST window include both
//! endpoints, so 15:30:00 is still market hours but 15:30:01 is not. The
//! opening window ends just before 09:20:00, matching the bars that make
//! up the opening range. Nothing here is cached: callers classify a fresh
//! `now` on every tick and query.

use chrono::{FixedOffset, NaiveTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

use crate::types::ExchangeTime;

/// IST is UTC+05:30.
pub const IST_OFFSET_MINUTES: i32 = 330;

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

/// Session open.
pub fn market_open() -> NaiveTime {
    hm(9, 15)
}

/// Session close.
pub fn market_close() -> NaiveTime {
    hm(15, 30)
}

/// End of the opening-range window.
pub fn opening_window_end() -> NaiveTime {
    hm(9, 20)
}

/// Start of the BTST window.
pub fn btst_window_start() -> NaiveTime {
    hm(15, 0)
}

fn within(t: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    start <= t && t <= end
}

/// Half-open membership, used for bar start times.
pub fn starts_within(t: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    start <= t && t < end
}

/// 09:15–15:30 inclusive.
pub fn in_market_hours(now: &ExchangeTime) -> bool {
    within(now.time(), market_open(), market_close())
}

/// 09:15 up to, not including, 09:20.
pub fn in_opening_window(now: &ExchangeTime) -> bool {
    starts_within(now.time(), market_open(), opening_window_end())
}

/// 15:00–15:30 inclusive.
pub fn in_btst_window(now: &ExchangeTime) -> bool {
    within(now.time(), btst_window_start(), market_close())
}

/// All window flags for one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarketWindows {
    pub market_hours: bool,
    pub opening_window: bool,
    pub btst_window: bool,
}

impl MarketWindows {
    pub fn at(now: &ExchangeTime) -> Self {
        Self {
            market_hours: in_market_hours(now),
            opening_window: in_opening_window(now),
            btst_window: in_btst_window(now),
        }
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now" in the exchange offset.
pub trait Clock: Send + Sync {
    fn now(&self) -> ExchangeTime;
}

/// Wall clock shifted into a fixed exchange offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> ExchangeTime {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Externally driven clock for replays and tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<ExchangeTime>,
}

impl ManualClock {
    pub fn new(start: ExchangeTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, t: ExchangeTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = t;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> ExchangeTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Build an exchange offset from minutes east of UTC.
pub fn exchange_offset(minutes_east: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes_east * 60)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
