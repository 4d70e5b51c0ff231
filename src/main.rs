//! NSE breakout scanner
//!
//! Entry point. Loads configuration, initialises structured logging,
//! starts the JSON dashboard, and runs the scanner loop until Ctrl+C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use breakout_scanner::config;
use breakout_scanner::dashboard;
use breakout_scanner::data::yahoo::YahooClient;
use breakout_scanner::data::MarketDataSource;
use breakout_scanner::engine::{ScanQuery, ScanState, Scanner};
use breakout_scanner::market::{Clock, SystemClock};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("SCANNER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    let offset = cfg.scanner.offset()?;
    info!(
        config = %config_path,
        symbols = cfg.scanner.watchlist.len(),
        interval_secs = cfg.scanner.interval_secs,
        utc_offset_minutes = cfg.scanner.utc_offset_minutes,
        "Breakout scanner starting up"
    );

    // -- Initialise components -------------------------------------------

    let source: Arc<dyn MarketDataSource> = Arc::new(
        YahooClient::new(&cfg.data_source, offset).context("Failed to build market data client")?,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(offset));
    let state = Arc::new(ScanState::new());

    let scanner = Scanner::new(source, state.clone(), clock.clone(), &cfg.scanner, &cfg.btst);
    let query = Arc::new(ScanQuery::new(state, clock));

    if cfg.dashboard.enabled {
        dashboard::spawn_dashboard(query.clone(), cfg.dashboard.port).await?;
    } else {
        info!("Dashboard disabled");
    }

    let status = query.window_status();
    info!(
        time = %status.current_time,
        market_hours = status.in_market_hours,
        btst_window = status.in_btst_window,
        "Entering scan loop. Press Ctrl+C to stop."
    );

    // -- Main loop ---------------------------------------------------------

    scanner
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, shutting down gracefully...");
        })
        .await;

    info!("Breakout scanner shut down cleanly");
    Ok(())
}

/// Initialise the tracing subscriber.
///
/// `RUST_LOG` overrides the default filter; `SCANNER_LOG_JSON` switches to
/// JSON lines.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("breakout_scanner=info"));

    let json_logging = std::env::var("SCANNER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
