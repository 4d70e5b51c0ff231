//! Market data sources.
//!
//! Defines the `MarketDataSource` trait the scanner consumes, plus the
//! Yahoo Finance chart implementation used in production.

pub mod yahoo;

use async_trait::async_trait;

use crate::types::{Bar, BarInterval, ScanError, Symbol};

/// Abstraction over OHLCV providers.
///
/// Implementations return bars oldest-first with timestamps in the
/// exchange offset. An empty or failed upstream response is reported as
/// `ScanError::DataUnavailable`; the scanner skips the symbol for that
/// tick rather than treating it as fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Today's session at the given intraday granularity.
    async fn fetch_intraday(
        &self,
        symbol: &Symbol,
        interval: BarInterval,
    ) -> Result<Vec<Bar>, ScanError>;

    /// The most recent `sessions` daily bars, one per trading session.
    ///
    /// `sessions` counts bars, not calendar days: weekends and exchange
    /// holidays are the source's problem. Fewer bars may come back for a
    /// recent listing.
    async fn fetch_daily(&self, symbol: &Symbol, sessions: u32) -> Result<Vec<Bar>, ScanError>;

    /// Source name for logging.
    fn name(&self) -> &str;
}
