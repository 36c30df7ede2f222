use analysis_core::{OptionChain, OptionContract, UnusualFlowEntry};

use crate::FlowThresholds;

/// Dollar notional traded: last price x volume x multiplier.
pub fn premium(contract: &OptionContract, multiplier: f64) -> f64 {
    contract.last_price * contract.volume as f64 * multiplier
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnusualFlowDetector {
    thresholds: FlowThresholds,
}

impl UnusualFlowDetector {
    pub fn new(thresholds: FlowThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &FlowThresholds {
        &self.thresholds
    }

    /// Unusual contracts of `chain`, calls then puts, in fetch order.
    pub fn detect(&self, chain: &OptionChain) -> Vec<UnusualFlowEntry> {
        let flow = self.detect_contracts(chain.contracts());
        tracing::debug!(
            calls = chain.calls.len(),
            puts = chain.puts.len(),
            unusual = flow.len(),
            volume_oi_ratio = self.thresholds.volume_oi_ratio,
            min_premium = self.thresholds.min_premium,
            "Screened option chain"
        );
        flow
    }

    pub fn detect_contracts<'a, I>(&self, contracts: I) -> Vec<UnusualFlowEntry>
    where
        I: IntoIterator<Item = &'a OptionContract>,
    {
        contracts
            .into_iter()
            .filter_map(|contract| self.evaluate(contract))
            .collect()
    }

    /// The flow entry for `contract` if it clears both thresholds.
    pub fn evaluate(&self, contract: &OptionContract) -> Option<UnusualFlowEntry> {
        let t = &self.thresholds;
        let premium = premium(contract, t.contract_multiplier);
        let heavy_volume = contract.volume as f64 > contract.open_interest as f64 * t.volume_oi_ratio;

        if heavy_volume && premium > t.min_premium {
            Some(UnusualFlowEntry {
                contract: contract.clone(),
                premium,
            })
        } else {
            None
        }
    }
}
