//! Signal API Routes

use analysis_core::Signal;
use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use signal_engine::SignalRecord;

use crate::{AppState, RequestId};

pub fn signal_routes() -> Router<AppState> {
    Router::new()
        .route("/ai/:ticker", get(get_ai_signal))
        .route("/signals", get(get_signal_history))
}

/// Always 200; synthesis failures come back as a zeroed neutral signal.
async fn get_ai_signal(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(ticker): Path<String>,
) -> Json<Signal> {
    tracing::debug!(request_id = %request_id.0, ticker = %ticker, "Synthesizing signal");

    let report = state.synthesizer.synthesize(&ticker).await;
    if !report.degraded {
        state
            .signal_history
            .push(SignalRecord {
                ticker,
                timestamp: Utc::now(),
                summary: report.summary.unwrap_or_default(),
                signal: report.signal.clone(),
            })
            .await;
    }

    Json(report.signal)
}

async fn get_signal_history(State(state): State<AppState>) -> Json<Vec<SignalRecord>> {
    Json(state.signal_history.snapshot().await)
}
