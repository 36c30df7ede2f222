use analysis_core::{round2, Bar};

pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Returned when there are fewer than `period + 1` closes.
pub const RSI_INSUFFICIENT_DATA: f64 = 50.0;
/// Returned when the series has no up-moves (flat series included).
pub const RSI_NO_GAINS: f64 = 30.0;
/// Returned when the series has no down-moves.
pub const RSI_NO_LOSSES: f64 = 70.0;

/// Closing prices of `bars`, in order.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Relative Strength Index of a chronological close series, rounded to cents.
///
/// Gains and losses are collected separately from the close-to-close deltas
/// (zero deltas count as neither), and each average is the mean of its own
/// most recent `period` values. This is a simple-average RSI, not Wilder
/// smoothing. Degenerate series map to fixed sentinels:
/// too short -> 50, no gains -> 30, no losses -> 70.
pub fn rsi(closes: &[f64], period: usize) -> f64 {
    let period = period.max(1);
    if closes.len() < period + 1 {
        return RSI_INSUFFICIENT_DATA;
    }

    let mut gains = Vec::new();
    let mut losses = Vec::new();
    for w in closes.windows(2) {
        let change = w[1] - w[0];
        if change > 0.0 {
            gains.push(change);
        } else if change < 0.0 {
            losses.push(-change);
        }
    }

    if gains.is_empty() {
        return RSI_NO_GAINS;
    }
    if losses.is_empty() {
        return RSI_NO_LOSSES;
    }

    let avg_gain = tail_mean(&gains, period);
    let avg_loss = tail_mean(&losses, period);
    if avg_loss == 0.0 {
        return RSI_NO_LOSSES;
    }

    let rs = avg_gain / avg_loss;
    round2(100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

/// Mean of the last `n` values (or all of them when fewer exist).
fn tail_mean(values: &[f64], n: usize) -> f64 {
    let tail = &values[values.len().saturating_sub(n)..];
    tail.iter().sum::<f64>() / tail.len() as f64
}
