//! Background watchlist scanner.
//!
//! Every cycle, each watched ticker's nearest-expiration chain is screened for
//! unusual flow; tickers with flow and an RSI extreme are appended to a
//! bounded [`ScanHistory`] that request handlers read concurrently.

pub mod config;
pub mod market_scanner;
pub mod metrics;

pub use config::ScannerConfig;
pub use market_scanner::{CycleSummary, FlowScanner, TickerOutcome};
pub use metrics::ScannerMetrics;

use analysis_core::{RollingHistory, ScanResult};

/// Rolling history of scanner hits, newest last.
pub type ScanHistory = RollingHistory<ScanResult>;
