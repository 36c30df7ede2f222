use std::time::Instant;

/// Structured telemetry for the scanner.
/// Tracks per-cycle timing and aggregate counts of hits and swallowed failures.
#[derive(Debug, Default, Clone)]
pub struct ScannerMetrics {
    pub cycles_run: u64,
    pub tickers_scanned: u64,
    pub tickers_without_flow: u64,
    pub tickers_neutral: u64,
    pub results_recorded: u64,
    pub ticker_failures: u64,
    pub ticker_timeouts: u64,

    pub last_cycle_duration_ms: u64,
    log_interval_cycles: u64,
}

impl ScannerMetrics {
    pub fn new(log_interval_cycles: u64) -> Self {
        Self {
            log_interval_cycles,
            ..Self::default()
        }
    }

    pub fn finish_cycle(&mut self, cycle_start: Instant) {
        self.last_cycle_duration_ms = cycle_start.elapsed().as_millis() as u64;
        self.cycles_run += 1;

        if self.log_interval_cycles > 0 && self.cycles_run % self.log_interval_cycles == 0 {
            self.log_metrics();
        }
    }

    /// Share of scanned tickers that failed (0-100%)
    pub fn failure_rate(&self) -> f64 {
        if self.tickers_scanned == 0 {
            return 0.0;
        }
        (self.ticker_failures as f64 / self.tickers_scanned as f64) * 100.0
    }

    pub fn log_metrics(&self) {
        tracing::info!(
            cycles = self.cycles_run,
            scanned = self.tickers_scanned,
            recorded = self.results_recorded,
            no_flow = self.tickers_without_flow,
            neutral = self.tickers_neutral,
            failures = self.ticker_failures,
            timeouts = self.ticker_timeouts,
            failure_rate_pct = self.failure_rate(),
            last_cycle_ms = self.last_cycle_duration_ms,
            "Scanner metrics"
        );
    }
}
