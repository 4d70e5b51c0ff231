//! Buy-today-sell-tomorrow (BTST) candidate detection.
//!
//! Runs only in the last half hour of the session. A symbol qualifies
//! when two conditions hold together:
//!
//! 1. **Volume surge**: the bars starting in [15:00, 15:30) carry at least
//!    `surge_ratio` of an average day's volume. At a uniform rate a half
//!    hour is roughly 8% of a 6h15m session, so the default 15% needs
//!    clearly elevated activity.
//! 2. **Near breakout**: price sits between `near_min_pct` and
//!    `near_max_pct` below the trailing resistance (bullish) or above the
//!    trailing support (bearish).
//!
//! A symbol that fails either condition yields `None` and is dropped from
//! the BTST map.

use chrono::NaiveDate;
use tracing::debug;

use crate::config::BtstConfig;
use crate::engine::breakout::current_price;
use crate::market::clock::{btst_window_start, market_close, starts_within};
use crate::types::{
    round2, Bar, BtstRecord, Direction, ExchangeTime, ScanError, SupportResistance, Symbol,
};

/// Highest high and lowest low over the last `periods` daily bars.
///
/// `None` when fewer than `periods` bars are available.
pub fn support_resistance(daily: &[Bar], periods: usize) -> Option<SupportResistance> {
    if periods == 0 || daily.len() < periods {
        return None;
    }
    let window = &daily[daily.len() - periods..];
    let resistance = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let support = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    Some(SupportResistance { resistance, support })
}

/// Total volume of `trading_day` bars starting in [15:00, 15:30).
pub fn trailing_window_volume(bars: &[Bar], trading_day: NaiveDate) -> u64 {
    bars.iter()
        .filter(|b| {
            b.timestamp.date_naive() == trading_day
                && starts_within(b.timestamp.time(), btst_window_start(), market_close())
        })
        .map(|b| b.volume)
        .sum()
}

/// Mean volume over the last `lookback` daily bars.
pub fn average_volume(daily: &[Bar], lookback: usize) -> Option<f64> {
    let start = daily.len().saturating_sub(lookback);
    let window = &daily[start..];
    if window.is_empty() {
        return None;
    }
    let total: u64 = window.iter().map(|b| b.volume).sum();
    Some(total as f64 / window.len() as f64)
}

/// Direction and distance (in percent of price) to the nearer band edge.
///
/// Resistance is checked first, so a price inside both bands reads as
/// bullish.
pub fn near_breakout(
    price: f64,
    levels: &SupportResistance,
    min_pct: f64,
    max_pct: f64,
) -> Option<(Direction, f64)> {
    if price <= 0.0 {
        return None;
    }
    let in_band = |pct: f64| min_pct <= pct && pct <= max_pct;

    let to_resistance = (levels.resistance - price) / price * 100.0;
    if in_band(to_resistance) {
        return Some((Direction::Bullish, to_resistance));
    }

    let to_support = (price - levels.support) / price * 100.0;
    if in_band(to_support) {
        return Some((Direction::Bearish, to_support));
    }

    None
}

pub struct BtstDetector {
    config: BtstConfig,
}

impl BtstDetector {
    pub fn new(config: BtstConfig) -> Self {
        Self { config }
    }

    /// Daily sessions to request: enough for both the volume baseline and
    /// the support/resistance window.
    pub fn daily_lookback(&self) -> u32 {
        self.config
            .volume_lookback_days
            .max(self.config.sr_lookback_days)
    }

    /// Whether the trailing volume counts as a surge.
    pub fn is_volume_surge(&self, trailing_volume: u64, avg_daily_volume: f64) -> bool {
        avg_daily_volume > 0.0 && trailing_volume as f64 >= self.config.surge_ratio * avg_daily_volume
    }

    /// Evaluate one symbol. `Ok(None)` means it does not qualify this tick.
    pub fn evaluate(
        &self,
        symbol: &Symbol,
        daily: &[Bar],
        five_minute: &[Bar],
        one_minute: &[Bar],
        now: ExchangeTime,
    ) -> Result<Option<BtstRecord>, ScanError> {
        let needed = self.config.min_history_days as usize;
        if daily.len() < needed {
            return Err(ScanError::InsufficientHistory {
                symbol: symbol.clone(),
                needed,
                available: daily.len(),
            });
        }

        let price = current_price(one_minute, five_minute)
            .ok_or_else(|| ScanError::unavailable(symbol, "no closing price"))?;
        if !price.is_finite() || price <= 0.0 {
            return Err(ScanError::Compute {
                symbol: symbol.clone(),
                message: format!("invalid price {price}"),
            });
        }

        let trailing = trailing_window_volume(five_minute, now.date_naive());
        let avg = average_volume(daily, self.config.volume_lookback_days as usize).unwrap_or(0.0);
        let surge = self.is_volume_surge(trailing, avg);

        let levels = support_resistance(daily, self.config.sr_lookback_days as usize);
        let signal = levels.as_ref().and_then(|l| {
            near_breakout(price, l, self.config.near_min_pct, self.config.near_max_pct)
        });

        debug!(
            symbol = %symbol,
            price,
            trailing_volume = trailing,
            avg_daily_volume = avg,
            surge,
            signal = ?signal,
            "BTST evaluated"
        );

        let (Some(levels), Some((direction, proximity))) = (levels, signal) else {
            return Ok(None);
        };
        if !surge {
            return Ok(None);
        }

        Ok(Some(BtstRecord {
            symbol: symbol.clone(),
            current_price: price,
            trailing_30min_volume: trailing,
            avg_daily_volume: avg as u64,
            volume_ratio: round2(trailing as f64 / avg * 100.0),
            support: levels.support,
            resistance: levels.resistance,
            near_breakout_direction: direction,
            breakout_proximity_pct: round2(proximity),
            last_update_time: now,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
