//! Dashboard API route handlers.
//!
//! All endpoints return JSON read through `ScanQuery`.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::{ScanQuery, TickReport, WindowStatus};
use crate::types::{BreakoutRecord, BtstRecord, Symbol};

pub type AppState = Arc<ScanQuery>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A record with the symbol's short display name alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct Named<R> {
    pub name: String,
    #[serde(flatten)]
    pub record: R,
}

pub type NamedSnapshot<R> = BTreeMap<Symbol, Named<R>>;

fn with_names<R>(snapshot: BTreeMap<Symbol, R>) -> NamedSnapshot<R> {
    snapshot
        .into_iter()
        .map(|(symbol, record)| {
            let name = symbol.display_name().to_string();
            (symbol, Named { name, record })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/intraday
pub async fn get_intraday(State(query): State<AppState>) -> Json<NamedSnapshot<BreakoutRecord>> {
    Json(with_names(query.get_breakout_snapshot().await))
}

/// GET /api/btst
pub async fn get_btst(State(query): State<AppState>) -> Json<NamedSnapshot<BtstRecord>> {
    Json(with_names(query.get_btst_snapshot().await))
}

/// GET /api/market-status
pub async fn get_market_status(State(query): State<AppState>) -> Json<WindowStatus> {
    Json(query.window_status())
}

/// GET /api/scanner
pub async fn get_scanner(State(query): State<AppState>) -> Json<Option<TickReport>> {
    Json(query.last_tick().await)
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
