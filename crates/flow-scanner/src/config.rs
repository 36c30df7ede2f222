use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    // Market scanner
    pub watchlist: Vec<String>,
    pub scan_interval_seconds: u64,        // 120
    pub fetch_timeout_seconds: u64,        // 20, per external fetch

    // History
    pub history_capacity: usize,           // 50
    pub top_contracts: usize,              // 5 flow entries kept per hit

    // Momentum gate
    pub rsi_period: usize,                 // 14
    pub rsi_oversold: f64,                 // 35
    pub rsi_overbought: f64,               // 65

    // Telemetry
    pub metrics_log_interval_cycles: u64,  // 10
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            watchlist: ["SPY", "IWM", "NFLX", "TSLA"].iter().map(|s| s.to_string()).collect(),
            scan_interval_seconds: 120,
            fetch_timeout_seconds: 20,
            history_capacity: 50,
            top_contracts: 5,
            rsi_period: 14,
            rsi_oversold: 35.0,
            rsi_overbought: 65.0,
            metrics_log_interval_cycles: 10,
        }
    }
}

impl ScannerConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            watchlist: parse_watchlist(
                &env::var("WATCHLIST").unwrap_or_else(|_| "SPY,IWM,NFLX,TSLA".to_string()),
            ),
            scan_interval_seconds: env::var("SCAN_INTERVAL")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .context("SCAN_INTERVAL must be whole seconds")?,
            fetch_timeout_seconds: env::var("FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("FETCH_TIMEOUT_SECS must be whole seconds")?,
            history_capacity: env::var("SCAN_HISTORY_CAPACITY")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            top_contracts: env::var("SCAN_TOP_CONTRACTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            rsi_period: env::var("RSI_PERIOD")
                .unwrap_or_else(|_| "14".to_string())
                .parse()?,
            rsi_oversold: env::var("RSI_OVERSOLD")
                .unwrap_or_else(|_| "35".to_string())
                .parse()?,
            rsi_overbought: env::var("RSI_OVERBOUGHT")
                .unwrap_or_else(|_| "65".to_string())
                .parse()?,
            metrics_log_interval_cycles: env::var("METRICS_LOG_INTERVAL_CYCLES")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.watchlist.is_empty() {
            anyhow::bail!("WATCHLIST must name at least one ticker");
        }
        if self.scan_interval_seconds == 0 {
            anyhow::bail!("SCAN_INTERVAL must be positive");
        }
        if self.fetch_timeout_seconds == 0 {
            anyhow::bail!("FETCH_TIMEOUT_SECS must be positive");
        }
        if self.history_capacity == 0 {
            anyhow::bail!("SCAN_HISTORY_CAPACITY must be positive");
        }
        if self.rsi_oversold >= self.rsi_overbought {
            anyhow::bail!(
                "RSI_OVERSOLD ({}) must be below RSI_OVERBOUGHT ({})",
                self.rsi_oversold,
                self.rsi_overbought
            );
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    /// Oversold or overbought.
    pub fn is_momentum_extreme(&self, rsi: f64) -> bool {
        rsi < self.rsi_oversold || rsi > self.rsi_overbought
    }
}

fn parse_watchlist(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
