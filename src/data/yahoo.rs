//! Yahoo Finance chart API client.
//!
//! API: `https://query1.finance.yahoo.com/v8/finance/chart/{symbol}`
//! Auth: None required.
//! Intraday bars come from `range=1d`. Daily bars are requested over a
//! padded calendar range and trimmed to the last N sessions.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::MarketDataSource;
use crate::config::DataSourceConfig;
use crate::types::{Bar, BarInterval, ScanError, Symbol};

// ---------------------------------------------------------------------------
// Chart response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

/// Column-oriented OHLCV arrays. Yahoo emits `null` for empty minutes.
#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct YahooClient {
    http: Client,
    base_url: String,
    offset: FixedOffset,
}

impl YahooClient {
    pub fn new(config: &DataSourceConfig, offset: FixedOffset) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build Yahoo HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            offset,
        })
    }

    fn chart_url(&self, symbol: &Symbol) -> String {
        format!(
            "{}/v8/finance/chart/{}",
            self.base_url,
            urlencoding::encode(symbol.as_str())
        )
    }

    async fn fetch_chart(
        &self,
        symbol: &Symbol,
        interval: BarInterval,
        range: &str,
    ) -> Result<Vec<Bar>, ScanError> {
        let url = self.chart_url(symbol);
        debug!(symbol = %symbol, interval = %interval, range, "Fetching chart");

        let resp = self
            .http
            .get(&url)
            .query(&[("interval", interval.as_code()), ("range", range)])
            .send()
            .await
            .map_err(|e| ScanError::unavailable(symbol, format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScanError::unavailable(symbol, format!("HTTP {status}")));
        }

        let envelope: ChartEnvelope = resp
            .json()
            .await
            .map_err(|e| ScanError::unavailable(symbol, format!("malformed chart payload: {e}")))?;

        bars_from_chart(symbol, envelope, self.offset)
    }
}

#[async_trait]
impl MarketDataSource for YahooClient {
    async fn fetch_intraday(
        &self,
        symbol: &Symbol,
        interval: BarInterval,
    ) -> Result<Vec<Bar>, ScanError> {
        self.fetch_chart(symbol, interval, "1d").await
    }

    async fn fetch_daily(&self, symbol: &Symbol, sessions: u32) -> Result<Vec<Bar>, ScanError> {
        let range = format!("{}d", calendar_days_for(sessions.max(1)));
        let bars = self.fetch_chart(symbol, BarInterval::Daily, &range).await?;
        Ok(last_sessions(bars, sessions))
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Extra calendar days on top of weekends, for exchange holidays.
const HOLIDAY_PADDING_DAYS: u32 = 10;

/// Calendar `range` that covers at least `sessions` trading days.
fn calendar_days_for(sessions: u32) -> u32 {
    (sessions * 7).div_ceil(5) + HOLIDAY_PADDING_DAYS
}

/// Keep the most recent `sessions` bars.
fn last_sessions(mut bars: Vec<Bar>, sessions: u32) -> Vec<Bar> {
    let skip = bars.len().saturating_sub(sessions as usize);
    bars.split_off(skip)
}

/// Turn a chart payload into bars, skipping rows with missing prices.
fn bars_from_chart(
    symbol: &Symbol,
    envelope: ChartEnvelope,
    offset: FixedOffset,
) -> Result<Vec<Bar>, ScanError> {
    if let Some(err) = envelope.chart.error {
        return Err(ScanError::unavailable(
            symbol,
            format!("{}: {}", err.code, err.description),
        ));
    }

    let result = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ScanError::unavailable(symbol, "empty chart result"))?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let bars: Vec<Bar> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let timestamp = DateTime::from_timestamp(ts, 0)?.with_timezone(&offset);
            Some(Bar {
                timestamp,
                open: (*quote.open.get(i)?)?,
                high: (*quote.high.get(i)?)?,
                low: (*quote.low.get(i)?)?,
                close: (*quote.close.get(i)?)?,
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
            })
        })
        .collect();

    if bars.is_empty() {
        return Err(ScanError::unavailable(symbol, "no bars returned"));
    }

    Ok(bars)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
