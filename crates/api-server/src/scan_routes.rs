//! Scanner API Routes
//!
//! Health check, the rolling scan history and on-demand unusual flow.

use analysis_core::{ScanResult, UnusualFlowEntry};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::{AppError, AppState};

/// Most recent scan hits returned by `/scan`.
const SCAN_RESPONSE_LIMIT: usize = 50;

pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/scan", get(get_scan_results))
        .route("/flow/:ticker", get(get_unusual_flow))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "running" }))
}

/// Newest last.
async fn get_scan_results(State(state): State<AppState>) -> Json<Vec<ScanResult>> {
    Json(state.scan_history.recent(SCAN_RESPONSE_LIMIT).await)
}

/// Unusual contracts for the nearest expiration.
async fn get_unusual_flow(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<Vec<UnusualFlowEntry>>, AppError> {
    let chain = state.market_data.nearest_chain(&ticker).await?;
    let flow = chain.map(|c| state.detector.detect(&c)).unwrap_or_default();
    Ok(Json(flow))
}
