//! Configuration loading from TOML.
//!
//! Reads `config.toml` (or the path in `SCANNER_CONFIG`) and deserializes
//! into strongly-typed structs. Every section has defaults so a minimal
//! file only needs to override what differs.

use anyhow::{bail, Context, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::market::clock::{exchange_offset, IST_OFFSET_MINUTES};
use crate::types::Symbol;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub btst: BtstConfig,
    #[serde(default)]
    pub data_source: DataSourceConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Upper bound on any single data-source call.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Exchange offset, minutes east of UTC.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_watchlist")]
    pub watchlist: Vec<String>,
}

/// Thresholds for the end-of-day BTST detector.
#[derive(Debug, Deserialize, Clone)]
pub struct BtstConfig {
    /// Daily bars averaged for the volume baseline.
    #[serde(default = "default_volume_lookback_days")]
    pub volume_lookback_days: u32,
    /// Daily bars spanned by support/resistance.
    #[serde(default = "default_sr_lookback_days")]
    pub sr_lookback_days: u32,
    #[serde(default = "default_min_history_days")]
    pub min_history_days: u32,
    /// Fraction of average daily volume the last 30 minutes must carry.
    #[serde(default = "default_surge_ratio")]
    pub surge_ratio: f64,
    #[serde(default = "default_near_min_pct")]
    pub near_min_pct: f64,
    #[serde(default = "default_near_max_pct")]
    pub near_max_pct: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataSourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default = "default_dashboard_enabled")]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
}

fn default_interval_secs() -> u64 {
    30
}
fn default_fetch_timeout_secs() -> u64 {
    10
}
fn default_utc_offset_minutes() -> i32 {
    IST_OFFSET_MINUTES
}
fn default_watchlist() -> Vec<String> {
    [
        "RELIANCE.NS", "TCS.NS", "HDFCBANK.NS", "INFY.NS", "HINDUNILVR.NS",
        "ICICIBANK.NS", "BHARTIARTL.NS", "SBIN.NS", "BAJFINANCE.NS", "LICI.NS",
        "ITC.NS", "HCLTECH.NS", "LT.NS", "AXISBANK.NS", "MARUTI.NS",
        "SUNPHARMA.NS", "ONGC.NS", "NTPC.NS", "TITAN.NS", "WIPRO.NS",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_volume_lookback_days() -> u32 {
    10
}
fn default_sr_lookback_days() -> u32 {
    20
}
fn default_min_history_days() -> u32 {
    2
}
fn default_surge_ratio() -> f64 {
    0.15
}
fn default_near_min_pct() -> f64 {
    0.5
}
fn default_near_max_pct() -> f64 {
    1.0
}
fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}
fn default_http_timeout_secs() -> u64 {
    15
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; breakout-scanner/0.1)".to_string()
}
fn default_dashboard_enabled() -> bool {
    true
}
fn default_dashboard_port() -> u16 {
    5000
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            utc_offset_minutes: default_utc_offset_minutes(),
            watchlist: default_watchlist(),
        }
    }
}

impl Default for BtstConfig {
    fn default() -> Self {
        Self {
            volume_lookback_days: default_volume_lookback_days(),
            sr_lookback_days: default_sr_lookback_days(),
            min_history_days: default_min_history_days(),
            surge_ratio: default_surge_ratio(),
            near_min_pct: default_near_min_pct(),
            near_max_pct: default_near_max_pct(),
        }
    }
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_http_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: default_dashboard_enabled(),
            port: default_dashboard_port(),
        }
    }
}

impl ScannerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        exchange_offset(self.utc_offset_minutes).with_context(|| {
            format!("Invalid utc_offset_minutes: {}", self.utc_offset_minutes)
        })
    }

    /// Watch-list as symbols, in configured order.
    pub fn symbols(&self) -> Vec<Symbol> {
        self.watchlist.iter().map(|s| Symbol::new(s.trim())).collect()
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scanner cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scanner.watchlist.iter().all(|s| s.trim().is_empty()) {
            bail!("scanner.watchlist must contain at least one symbol");
        }
        if self.scanner.interval_secs == 0 {
            bail!("scanner.interval_secs must be positive");
        }
        if self.scanner.fetch_timeout_secs == 0 {
            bail!("scanner.fetch_timeout_secs must be positive");
        }
        self.scanner.offset()?;
        if self.btst.surge_ratio <= 0.0 {
            bail!("btst.surge_ratio must be positive");
        }
        if self.btst.near_min_pct > self.btst.near_max_pct {
            bail!(
                "btst.near_min_pct ({}) exceeds btst.near_max_pct ({})",
                self.btst.near_min_pct,
                self.btst.near_max_pct
            );
        }
        if self.btst.min_history_days == 0 {
            bail!("btst.min_history_days must be positive");
        }
        Ok(())
    }
}
