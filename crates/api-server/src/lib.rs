//! HTTP surface for the flow scanner.
//!
//! Wires the Yahoo/NewsAPI/OpenAI collaborators into the background
//! [`FlowScanner`] and the [`SignalSynthesizer`], and serves both behind an
//! axum router with CORS, request ids and request tracing.

pub mod config;
mod market_routes;
mod request_id;
mod scan_routes;
mod signal_routes;


use std::sync::Arc;

use analysis_core::{AnalysisError, MarketDataSource, RollingHistory};
use anyhow::Context;
use axum::{
    http::{HeaderValue, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Json, Router,
};
use flow_scanner::{FlowScanner, ScanHistory, ScannerConfig};
use llm_client::OpenAiClassifier;
use market_data::{NewsApiClient, YahooClient};
use notification_service::{NotificationConfig, NotificationService};
use options_flow::{FlowThresholds, UnusualFlowDetector};
use serde_json::json;
use signal_engine::{SignalRecord, SignalSynthesizer};
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use request_id::{RequestId, REQUEST_ID_HEADER};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub scan_history: Arc<ScanHistory>,
    pub signal_history: Arc<RollingHistory<SignalRecord>>,
    pub synthesizer: Arc<SignalSynthesizer>,
    pub market_data: Arc<dyn MarketDataSource>,
    pub detector: UnusualFlowDetector,
}

/// Errors surfaced by the pass-through market endpoints.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("upstream market data error: {0}")]
    Upstream(#[from] AnalysisError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Request failed");
        let body = json!({ "error": self.to_string() });
        (StatusCode::BAD_GATEWAY, Json(body)).into_response()
    }
}

pub fn build_router(state: AppState, cors_allowed_origins: &[String]) -> Router {
    Router::new()
        .merge(scan_routes::scan_routes())
        .merge(market_routes::market_routes())
        .merge(signal_routes::signal_routes())
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<axum::body::Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(cors_layer(cors_allowed_origins))
        .with_state(state)
}

/// `*` (or nothing) mirrors any origin; otherwise only the listed origins.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("Starting flow scanner API");

    let server_config = ServerConfig::from_env()?;
    let scanner_config = ScannerConfig::from_env()?;
    let detector = UnusualFlowDetector::new(FlowThresholds::from_env()?);
    let fetch_timeout = scanner_config.fetch_timeout();

    tracing::info!("  Watchlist: {}", scanner_config.watchlist.join(","));
    tracing::info!("  Scan interval: {} seconds", scanner_config.scan_interval_seconds);
    tracing::info!(
        "  Flow thresholds: volume > {}x OI, premium > ${}",
        detector.thresholds().volume_oi_ratio,
        detector.thresholds().min_premium
    );

    let market_data: Arc<dyn MarketDataSource> = Arc::new(YahooClient::new(fetch_timeout));

    let news = NewsApiClient::new(std::env::var("NEWS_API_KEY").unwrap_or_default(), fetch_timeout);
    if !news.is_configured() {
        tracing::warn!("NEWS_API_KEY not set; /ai signals will degrade to neutral");
    }
    let classifier = OpenAiClassifier::with_defaults();
    if !classifier.is_configured() {
        tracing::warn!("OPENAI_API_KEY not set; /ai signals will degrade to neutral");
    }

    let synthesizer = SignalSynthesizer::new(Arc::clone(&market_data), Arc::new(news), Arc::new(classifier))
        .with_detector(detector)
        .with_rsi_period(scanner_config.rsi_period)
        .with_fetch_timeout(fetch_timeout);

    let scan_history = Arc::new(ScanHistory::new(scanner_config.history_capacity));
    let notifier = NotificationService::new(&NotificationConfig::from_env());
    let scanner = FlowScanner::new(scanner_config, Arc::clone(&market_data), Arc::clone(&scan_history))
        .with_detector(detector)
        .with_notifier(notifier);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scanner_handle = tokio::spawn(scanner.run(shutdown_rx));

    let state = AppState {
        scan_history,
        signal_history: Arc::new(RollingHistory::new(server_config.signal_history_capacity)),
        synthesizer: Arc::new(synthesizer),
        market_data,
        detector,
    };
    let app = build_router(state, &server_config.cors_allowed_origins);

    let addr = server_config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scanner_handle.await {
        tracing::warn!("Scanner task ended abnormally: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let mut sigterm = match tokio::signal::unix::signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!("SIGTERM handler unavailable: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received SIGINT");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
    }
}
