//! Signal synthesis.
//!
//! Gathers unusual flow, intraday momentum, headlines and price for a ticker,
//! asks a [`MarketClassifier`](analysis_core::MarketClassifier) for a bias and
//! turns the answer into entry/stop/target levels. Synthesis never fails:
//! anything that goes wrong collapses to [`Signal::neutral`](analysis_core::Signal::neutral).

pub mod levels;
pub mod synthesizer;

pub use levels::{build_signal, trade_levels};
pub use synthesizer::{SignalInputs, SignalRecord, SignalReport, SignalSynthesizer};
