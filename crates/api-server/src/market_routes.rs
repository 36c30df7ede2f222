//! Market Data API Routes
//!
//! Thin pass-throughs over the market data source.

use analysis_core::{Bar, OptionContract, Quote};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::{AppError, AppState};

/// Intraday candle as served to chart clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Candle {
    pub datetime: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl From<&Bar> for Candle {
    fn from(bar: &Bar) -> Self {
        Self {
            datetime: bar.timestamp.format("%Y-%m-%d %H:%M:%S%:z").to_string(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume.max(0.0) as u64,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionRecord {
    pub strike: f64,
    pub last_price: f64,
    pub volume: u64,
    pub open_interest: u64,
    pub implied_volatility: f64,
}

impl From<&OptionContract> for OptionRecord {
    fn from(c: &OptionContract) -> Self {
        Self {
            strike: c.strike,
            last_price: c.last_price,
            volume: c.volume,
            open_interest: c.open_interest,
            implied_volatility: c.implied_volatility,
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct OptionsResponse {
    pub calls: Vec<OptionRecord>,
    pub puts: Vec<OptionRecord>,
}

pub fn market_routes() -> Router<AppState> {
    Router::new()
        .route("/quote/:ticker", get(get_quote))
        .route("/candles/:ticker", get(get_candles))
        .route("/options/:ticker", get(get_options))
}

async fn get_quote(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<Quote>, AppError> {
    Ok(Json(state.market_data.quote(&ticker).await?))
}

/// One trading day of 5-minute candles; empty when there is no data.
async fn get_candles(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<Vec<Candle>>, AppError> {
    let bars = state.market_data.intraday_bars(&ticker).await?;
    Ok(Json(bars.iter().map(Candle::from).collect()))
}

/// Nearest-expiration chain; empty lists when nothing is listed.
async fn get_options(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<OptionsResponse>, AppError> {
    let response = match state.market_data.nearest_chain(&ticker).await? {
        Some(chain) => OptionsResponse {
            calls: chain.calls.iter().map(OptionRecord::from).collect(),
            puts: chain.puts.iter().map(OptionRecord::from).collect(),
        },
        None => OptionsResponse::default(),
    };
    Ok(Json(response))
}
