//! Options Flow Module
//!
//! Flags option contracts whose traded volume dwarfs open interest and whose
//! notional premium is large, read as a proxy for large directional bets.

pub mod detector;
pub mod thresholds;

pub use detector::{premium, UnusualFlowDetector};
pub use thresholds::{FlowThresholds, CONTRACT_MULTIPLIER};
