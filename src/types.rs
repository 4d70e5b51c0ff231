//! Shared types for the scanner.
//!
//! These types form the data model used across all modules. Detectors,
//! the state store and the serving layer all depend on them, so they are
//! kept free of any engine logic.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A timestamp in the exchange's local offset.
pub type ExchangeTime = DateTime<FixedOffset>;

// ---------------------------------------------------------------------------
// Symbol
// ---------------------------------------------------------------------------

/// An exchange-qualified ticker, e.g. `RELIANCE.NS`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self(ticker.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ticker without the exchange suffix (`RELIANCE.NS` → `RELIANCE`).
    pub fn display_name(&self) -> &str {
        match self.0.rsplit_once('.') {
            Some((name, _suffix)) if !name.is_empty() => name,
            _ => &self.0,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// Bars
// ---------------------------------------------------------------------------

/// One OHLCV observation. `timestamp` is the bar's start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: ExchangeTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Bar granularity requested from a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarInterval {
    OneMinute,
    FiveMinute,
    Daily,
}

impl BarInterval {
    /// Interval code understood by the chart API.
    pub fn as_code(&self) -> &'static str {
        match self {
            BarInterval::OneMinute => "1m",
            BarInterval::FiveMinute => "5m",
            BarInterval::Daily => "1d",
        }
    }
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Close of the last bar in a series, if any.
pub fn last_close(bars: &[Bar]) -> Option<f64> {
    bars.last().map(|b| b.close)
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Breakout direction relative to a reference band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
    #[serde(rename = "none")]
    Neutral,
}

impl Direction {
    pub fn is_breakout(&self) -> bool {
        !matches!(self, Direction::Neutral)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Bullish => write!(f, "bullish"),
            Direction::Bearish => write!(f, "bearish"),
            Direction::Neutral => write!(f, "none"),
        }
    }
}

/// High/low of the first five minutes of one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpeningRange {
    pub trading_day: NaiveDate,
    pub high: f64,
    pub low: f64,
}

/// Latest opening-range breakout state for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutRecord {
    pub symbol: Symbol,
    pub trading_day: NaiveDate,
    pub current_price: f64,
    pub opening_range: OpeningRange,
    pub direction: Direction,
    /// Set the first time `direction` leaves `Neutral` on `trading_day`.
    pub first_breakout_time: Option<ExchangeTime>,
    pub last_update_time: ExchangeTime,
}

/// Trailing daily high/low band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupportResistance {
    pub resistance: f64,
    pub support: f64,
}

/// A BTST candidate: volume surge plus price close to the band edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BtstRecord {
    pub symbol: Symbol,
    pub current_price: f64,
    pub trailing_30min_volume: u64,
    pub avg_daily_volume: u64,
    /// Trailing volume as a percentage of average daily volume.
    pub volume_ratio: f64,
    pub support: f64,
    pub resistance: f64,
    pub near_breakout_direction: Direction,
    pub breakout_proximity_pct: f64,
    pub last_update_time: ExchangeTime,
}

/// Round to two decimal places for display fields.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Per-symbol scan failures. None of these abort a tick.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScanError {
    #[error("Data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: Symbol, reason: String },

    #[error("Insufficient history for {symbol}: need {needed} bars, have {available}")]
    InsufficientHistory {
        symbol: Symbol,
        needed: usize,
        available: usize,
    },

    #[error("Opening range not yet formed for {symbol}")]
    OpeningRangePending { symbol: Symbol },

    #[error("Fetch for {symbol} timed out after {secs}s")]
    Timeout { symbol: Symbol, secs: u64 },

    #[error("Computation failed for {symbol}: {message}")]
    Compute { symbol: Symbol, message: String },
}

impl ScanError {
    pub fn unavailable(symbol: &Symbol, reason: impl Into<String>) -> Self {
        ScanError::DataUnavailable {
            symbol: symbol.clone(),
            reason: reason.into(),
        }
    }

    /// Expected conditions that simply skip the symbol for this tick.
    pub fn is_skip(&self) -> bool {
        !matches!(self, ScanError::Compute { .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
