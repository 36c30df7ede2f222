use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Spot quote summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: Option<f64>,
    pub change: Option<f64>,
    pub volume: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionSide {
    Call,
    Put,
}

/// A single listed option contract as fetched for one expiration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionContract {
    pub strike: f64,
    pub last_price: f64,
    pub volume: u64,
    pub open_interest: u64,
    pub implied_volatility: f64,
    pub side: OptionSide,
}

/// Calls and puts for a single (ticker, expiration) pair, in fetch order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionChain {
    pub calls: Vec<OptionContract>,
    pub puts: Vec<OptionContract>,
}

impl OptionChain {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.puts.is_empty()
    }

    /// Calls followed by puts.
    pub fn contracts(&self) -> impl Iterator<Item = &OptionContract> {
        self.calls.iter().chain(self.puts.iter())
    }
}

/// An option contract flagged as unusual, with its derived notional premium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnusualFlowEntry {
    #[serde(flatten)]
    pub contract: OptionContract,
    pub premium: f64,
}

/// A watchlist hit recorded by the background scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub ticker: String,
    pub rsi: f64,
    pub contracts: Vec<UnusualFlowEntry>,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bias {
    Calls,
    Puts,
    #[default]
    Neutral,
}

impl Bias {
    /// Lenient parse; anything unrecognised reads as neutral.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CALLS" | "CALL" => Bias::Calls,
            "PUTS" | "PUT" => Bias::Puts,
            _ => Bias::Neutral,
        }
    }
}

/// Directional trade bias with entry/stop/target levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub bias: Bias,
    pub confidence: u8,
    pub price: f64,
    pub stop: f64,
    pub target: f64,
}

impl Signal {
    /// Fully zeroed neutral signal returned whenever synthesis cannot complete.
    pub fn neutral() -> Self {
        Self {
            bias: Bias::Neutral,
            confidence: 0,
            price: 0.0,
            stop: 0.0,
            target: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedTrade {
    #[serde(rename = "type", default)]
    pub trade_type: String,
    #[serde(default)]
    pub strike: serde_json::Value,
    #[serde(default)]
    pub expiration: String,
    #[serde(default)]
    pub logic: String,
}

/// Everything the classifier is told about a ticker.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub ticker: String,
    pub price: f64,
    pub rsi: f64,
    pub flow: Vec<UnusualFlowEntry>,
    pub headlines: Vec<String>,
}

/// Classifier output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketVerdict {
    pub bias: Bias,
    pub confidence: u8,
    pub summary: String,
    pub reasons: Vec<String>,
    pub suggested_trades: Vec<SuggestedTrade>,
}

impl MarketVerdict {
    /// Verdict used when the classifier answered but not in the expected shape.
    pub fn unstructured(raw: impl Into<String>) -> Self {
        Self {
            bias: Bias::Neutral,
            confidence: 0,
            summary: raw.into(),
            reasons: Vec::new(),
            suggested_trades: Vec::new(),
        }
    }
}
