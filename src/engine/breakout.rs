//! Opening-range breakout detection.
//!
//! The opening range is the high/low of the bars that start between
//! 09:15 and 09:20 on the current trading day. Each tick the latest price
//! is classified against that band. `direction` is recomputed from scratch
//! every time; `first_breakout_time` is the only sticky field and survives
//! direction flips until the trading day changes.

use chrono::NaiveDate;
use tracing::debug;

use crate::market::clock::{market_open, opening_window_end, starts_within};
use crate::types::{
    last_close, Bar, BreakoutRecord, Direction, ExchangeTime, OpeningRange, ScanError, Symbol,
};

/// Aggregate the bars that start inside the opening window of `trading_day`.
///
/// Works for any intraday granularity: with 5-minute bars this is the first
/// candle, with 1-minute bars it folds the first five.
pub fn locate_opening_range(bars: &[Bar], trading_day: NaiveDate) -> Option<OpeningRange> {
    bars.iter()
        .filter(|b| {
            b.timestamp.date_naive() == trading_day
                && starts_within(b.timestamp.time(), market_open(), opening_window_end())
        })
        .fold(None, |range: Option<OpeningRange>, bar| {
            Some(match range {
                None => OpeningRange {
                    trading_day,
                    high: bar.high,
                    low: bar.low,
                },
                Some(r) => OpeningRange {
                    high: r.high.max(bar.high),
                    low: r.low.min(bar.low),
                    ..r
                },
            })
        })
}

/// Price versus the opening band.
pub fn classify(price: f64, range: &OpeningRange) -> Direction {
    if price > range.high {
        Direction::Bullish
    } else if price < range.low {
        Direction::Bearish
    } else {
        Direction::Neutral
    }
}

/// Most recent close at the finest granularity available.
pub fn current_price(fine: &[Bar], coarse: &[Bar]) -> Option<f64> {
    last_close(fine).or_else(|| last_close(coarse))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BreakoutDetector;

impl BreakoutDetector {
    pub fn new() -> Self {
        Self
    }

    /// Build the next record for `symbol`.
    ///
    /// `previous` is the record currently in the store, if any. Its
    /// opening range is reused only once it was computed after 09:20 on
    /// the same trading day; before that the first candle may still be
    /// forming, so the range is rebuilt from the bars. The first breakout
    /// time carries over only while the range it was measured against is
    /// unchanged.
    pub fn evaluate(
        &self,
        symbol: &Symbol,
        previous: Option<&BreakoutRecord>,
        five_minute: &[Bar],
        one_minute: &[Bar],
        now: ExchangeTime,
    ) -> Result<BreakoutRecord, ScanError> {
        let trading_day = now.date_naive();
        let same_day = previous.filter(|p| p.trading_day == trading_day);
        let settled = same_day.filter(|p| p.last_update_time.time() >= opening_window_end());

        let opening_range = match settled {
            Some(p) => p.opening_range,
            None => locate_opening_range(five_minute, trading_day).ok_or_else(|| {
                ScanError::OpeningRangePending {
                    symbol: symbol.clone(),
                }
            })?,
        };

        let price = current_price(one_minute, five_minute)
            .ok_or_else(|| ScanError::unavailable(symbol, "no closing price"))?;
        if !price.is_finite() || price <= 0.0 {
            return Err(ScanError::Compute {
                symbol: symbol.clone(),
                message: format!("invalid price {price}"),
            });
        }

        let direction = classify(price, &opening_range);

        let carried = same_day
            .filter(|p| p.opening_range == opening_range)
            .and_then(|p| p.first_breakout_time);
        let first_breakout_time = match carried {
            Some(t) => Some(t),
            None if direction.is_breakout() => {
                debug!(symbol = %symbol, direction = %direction, price, "First breakout of the day");
                Some(now)
            }
            None => None,
        };

        Ok(BreakoutRecord {
            symbol: symbol.clone(),
            trading_day,
            current_price: price,
            opening_range,
            direction,
            first_breakout_time,
            last_update_time: now,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
