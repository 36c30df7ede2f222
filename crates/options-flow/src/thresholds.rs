use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Shares controlled by one listed equity option.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowThresholds {
    /// Volume must be strictly greater than `volume_oi_ratio * open_interest`.
    pub volume_oi_ratio: f64,
    /// Premium must be strictly greater than this many dollars.
    pub min_premium: f64,
    pub contract_multiplier: f64,
}

impl Default for FlowThresholds {
    fn default() -> Self {
        Self {
            volume_oi_ratio: 2.0,
            min_premium: 200_000.0,
            contract_multiplier: CONTRACT_MULTIPLIER,
        }
    }
}

impl FlowThresholds {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            volume_oi_ratio: match env::var("FLOW_VOLUME_OI_RATIO") {
                Ok(v) => v.parse().context("FLOW_VOLUME_OI_RATIO must be a number")?,
                Err(_) => defaults.volume_oi_ratio,
            },
            min_premium: match env::var("FLOW_MIN_PREMIUM") {
                Ok(v) => v.parse().context("FLOW_MIN_PREMIUM must be a number")?,
                Err(_) => defaults.min_premium,
            },
            contract_multiplier: defaults.contract_multiplier,
        })
    }
}
