use analysis_core::{round2, Bias, MarketVerdict, Signal};

const STOP_OFFSET: f64 = 0.01;
const TARGET_OFFSET: f64 = 0.02;

/// `(stop, target)` for an entry at `price`.
///
/// CALLS and NEUTRAL risk 1% below for 2% above; PUTS mirror it.
pub fn trade_levels(price: f64, bias: Bias) -> (f64, f64) {
    match bias {
        Bias::Puts => (
            round2(price * (1.0 + STOP_OFFSET)),
            round2(price * (1.0 - TARGET_OFFSET)),
        ),
        Bias::Calls | Bias::Neutral => (
            round2(price * (1.0 - STOP_OFFSET)),
            round2(price * (1.0 + TARGET_OFFSET)),
        ),
    }
}

pub fn build_signal(price: f64, verdict: &MarketVerdict) -> Signal {
    let (stop, target) = trade_levels(price, verdict.bias);
    Signal {
        bias: verdict.bias,
        confidence: verdict.confidence.min(100),
        price: round2(price),
        stop,
        target,
    }
}
