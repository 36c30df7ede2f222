use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use analysis_core::{AnalysisError, MarketDataSource, ScanResult};
use chrono::Utc;
use notification_service::NotificationService;
use options_flow::UnusualFlowDetector;
use technical_analysis::{closes, rsi};
use tokio::sync::watch;

use crate::config::ScannerConfig;
use crate::metrics::ScannerMetrics;
use crate::ScanHistory;

/// What happened to one ticker in one cycle.
#[derive(Debug, Clone)]
pub enum TickerOutcome {
    Recorded(ScanResult),
    NoUnusualFlow,
    NeutralMomentum { rsi: f64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub scanned: usize,
    pub recorded: usize,
    pub no_flow: usize,
    pub neutral: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub duration_ms: u64,
}

pub struct FlowScanner {
    config: ScannerConfig,
    market_data: Arc<dyn MarketDataSource>,
    detector: UnusualFlowDetector,
    history: Arc<ScanHistory>,
    notifier: Option<NotificationService>,
    metrics: ScannerMetrics,
}

impl FlowScanner {
    pub fn new(
        config: ScannerConfig,
        market_data: Arc<dyn MarketDataSource>,
        history: Arc<ScanHistory>,
    ) -> Self {
        let metrics = ScannerMetrics::new(config.metrics_log_interval_cycles);
        Self {
            config,
            market_data,
            detector: UnusualFlowDetector::default(),
            history,
            notifier: None,
            metrics,
        }
    }

    pub fn with_detector(mut self, detector: UnusualFlowDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_notifier(mut self, notifier: NotificationService) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn metrics(&self) -> &ScannerMetrics {
        &self.metrics
    }

    /// Bound one external fetch by the configured timeout.
    async fn fetch<T, F>(&self, what: &str, ticker: &str, fut: F) -> Result<T, AnalysisError>
    where
        F: Future<Output = Result<T, AnalysisError>>,
    {
        let limit = self.config.fetch_timeout();
        tokio::time::timeout(limit, fut).await.map_err(|_| {
            AnalysisError::Timeout(format!("{} for {} exceeded {}s", what, ticker, limit.as_secs()))
        })?
    }

    /// FETCH and EVALUATE one ticker, appending to history on a hit.
    pub async fn scan_ticker(&self, ticker: &str) -> Result<TickerOutcome, AnalysisError> {
        let chain = self
            .fetch("option chain", ticker, self.market_data.nearest_chain(ticker))
            .await?;
        let flow = chain.map(|c| self.detector.detect(&c)).unwrap_or_default();
        if flow.is_empty() {
            return Ok(TickerOutcome::NoUnusualFlow);
        }

        let bars = self
            .fetch("intraday bars", ticker, self.market_data.intraday_bars(ticker))
            .await?;
        let rsi = rsi(&closes(&bars), self.config.rsi_period);
        if !self.config.is_momentum_extreme(rsi) {
            return Ok(TickerOutcome::NeutralMomentum { rsi });
        }

        let result = ScanResult {
            ticker: ticker.to_string(),
            rsi,
            contracts: flow.into_iter().take(self.config.top_contracts).collect(),
            scanned_at: Utc::now(),
        };
        self.history.push(result.clone()).await;

        if let Some(notifier) = &self.notifier {
            notifier.notify(self.format_hit(&result));
        }

        Ok(TickerOutcome::Recorded(result))
    }

    /// One pass over the watchlist. Per-ticker failures are logged and skipped.
    pub async fn run_cycle(&mut self) -> CycleSummary {
        let cycle_start = Instant::now();
        let mut summary = CycleSummary::default();

        for ticker in &self.config.watchlist {
            summary.scanned += 1;
            match self.scan_ticker(ticker).await {
                Ok(TickerOutcome::Recorded(result)) => {
                    summary.recorded += 1;
                    tracing::info!(
                        ticker = %ticker,
                        rsi = result.rsi,
                        contracts = result.contracts.len(),
                        "Unusual flow at momentum extreme recorded"
                    );
                }
                Ok(TickerOutcome::NoUnusualFlow) => {
                    summary.no_flow += 1;
                    tracing::debug!(ticker = %ticker, "No unusual flow");
                }
                Ok(TickerOutcome::NeutralMomentum { rsi }) => {
                    summary.neutral += 1;
                    tracing::debug!(ticker = %ticker, rsi, "Unusual flow but RSI not extreme");
                }
                Err(e) => {
                    summary.failed += 1;
                    if matches!(e, AnalysisError::Timeout(_)) {
                        summary.timed_out += 1;
                    }
                    tracing::warn!(ticker = %ticker, error = %e, "Ticker scan failed, skipping this cycle");
                }
            }
        }

        summary.duration_ms = cycle_start.elapsed().as_millis() as u64;

        self.metrics.tickers_scanned += summary.scanned as u64;
        self.metrics.results_recorded += summary.recorded as u64;
        self.metrics.tickers_without_flow += summary.no_flow as u64;
        self.metrics.tickers_neutral += summary.neutral as u64;
        self.metrics.ticker_failures += summary.failed as u64;
        self.metrics.ticker_timeouts += summary.timed_out as u64;
        self.metrics.finish_cycle(cycle_start);

        tracing::info!(
            scanned = summary.scanned,
            recorded = summary.recorded,
            failed = summary.failed,
            duration_ms = summary.duration_ms,
            "Scan cycle complete"
        );

        summary
    }

    /// Scan, sleep, repeat until `shutdown` flips to true or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Flow scanner started: {} tickers every {}s",
            self.config.watchlist.len(),
            self.config.scan_interval_seconds
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = self.run_cycle() => {}
                _ = shutdown.changed() => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.scan_interval()) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.metrics.log_metrics();
        tracing::info!("Flow scanner stopped");
    }

    fn format_hit(&self, result: &ScanResult) -> String {
        let zone = if result.rsi < self.config.rsi_oversold {
            "oversold"
        } else {
            "overbought"
        };
        let total_premium: f64 = result.contracts.iter().map(|c| c.premium).sum();

        format!(
            "**Unusual flow: {}**\nRSI {:.2} ({}) | {} contracts | ${:.0} premium",
            result.ticker,
            result.rsi,
            zone,
            result.contracts.len(),
            total_premium
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Bar, OptionChain, OptionContract, OptionSide, Quote};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use notification_service::{NotificationChannel, NotificationError};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    enum FakeTicker {
        Listed { chain: Option<OptionChain>, closes: Vec<f64> },
        Fails,
        Hangs,
    }

    #[derive(Default)]
    struct FakeMarket {
        tickers: HashMap<String, FakeTicker>,
    }

    impl FakeMarket {
        fn with(mut self, ticker: &str, behaviour: FakeTicker) -> Self {
            self.tickers.insert(ticker.to_string(), behaviour);
            self
        }
    }

    #[async_trait]
    impl MarketDataSource for FakeMarket {
        async fn expirations(&self, _ticker: &str) -> Result<Vec<NaiveDate>, AnalysisError> {
            Err(AnalysisError::ApiError("not used".to_string()))
        }

        async fn option_chain(&self, _ticker: &str, _expiration: NaiveDate) -> Result<OptionChain, AnalysisError> {
            Err(AnalysisError::ApiError("not used".to_string()))
        }

        async fn intraday_bars(&self, ticker: &str) -> Result<Vec<Bar>, AnalysisError> {
            match self.tickers.get(ticker) {
                Some(FakeTicker::Listed { closes, .. }) => Ok(bars(closes)),
                _ => Err(AnalysisError::ApiError("no bars".to_string())),
            }
        }

        async fn quote(&self, _ticker: &str) -> Result<Quote, AnalysisError> {
            Err(AnalysisError::ApiError("not used".to_string()))
        }

        async fn nearest_chain(&self, ticker: &str) -> Result<Option<OptionChain>, AnalysisError> {
            match self.tickers.get(ticker) {
                Some(FakeTicker::Listed { chain, .. }) => Ok(chain.clone()),
                Some(FakeTicker::Hangs) => std::future::pending().await,
                Some(FakeTicker::Fails) | None => Err(AnalysisError::ApiError("connection reset".to_string())),
            }
        }
    }

    struct Recorder(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl NotificationChannel for Recorder {
        async fn send(&self, message: &str) -> Result<(), NotificationError> {
            self.0.lock().unwrap().push(message.to_string());
            Ok(())
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    fn bars(closes: &[f64]) -> Vec<Bar> {
        let start = Utc::now() - chrono::Duration::minutes(5 * closes.len() as i64);
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: start + chrono::Duration::minutes(5 * i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 10_000.0,
            })
            .collect()
    }

    fn unusual_call(strike: f64) -> OptionContract {
        OptionContract {
            strike,
            last_price: 10.0,
            volume: 250,
            open_interest: 100,
            implied_volatility: 0.3,
            side: OptionSide::Call,
        }
    }

    fn chain_with(unusual: usize) -> Option<OptionChain> {
        Some(OptionChain {
            calls: (0..unusual).map(|i| unusual_call(100.0 + i as f64)).collect(),
            puts: Vec::new(),
        })
    }

    fn rising() -> Vec<f64> {
        (0..20).map(|i| 100.0 + i as f64).collect()
    }

    fn choppy() -> Vec<f64> {
        (0..20).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect()
    }

    fn config(watchlist: &[&str]) -> ScannerConfig {
        ScannerConfig {
            watchlist: watchlist.iter().map(|s| s.to_string()).collect(),
            fetch_timeout_seconds: 1,
            ..ScannerConfig::default()
        }
    }

    fn scanner(market: FakeMarket, watchlist: &[&str]) -> (FlowScanner, Arc<ScanHistory>) {
        let history = Arc::new(ScanHistory::new(50));
        let scanner = FlowScanner::new(config(watchlist), Arc::new(market), Arc::clone(&history));
        (scanner, history)
    }

    #[tokio::test]
    async fn test_failing_ticker_does_not_stop_the_cycle() {
        let market = FakeMarket::default()
            .with("BAD", FakeTicker::Fails)
            .with("SPY", FakeTicker::Listed { chain: chain_with(2), closes: rising() });
        let (mut scanner, history) = scanner(market, &["BAD", "SPY"]);

        let summary = scanner.run_cycle().await;

        assert_eq!(summary.scanned, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.recorded, 1);
        let results = history.snapshot().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].ticker, "SPY");
        assert_eq!(results[0].rsi, 70.0);
        assert_eq!(scanner.metrics().ticker_failures, 1);
    }

    #[tokio::test]
    async fn test_slow_ticker_times_out_and_others_proceed() {
        let market = FakeMarket::default()
            .with("SLOW", FakeTicker::Hangs)
            .with("TSLA", FakeTicker::Listed { chain: chain_with(1), closes: rising() });
        let (mut scanner, history) = scanner(market, &["SLOW", "TSLA"]);

        let summary = scanner.run_cycle().await;

        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.recorded, 1);
        assert_eq!(history.snapshot().await[0].ticker, "TSLA");
    }

    #[tokio::test]
    async fn test_no_flow_skips_without_touching_history() {
        let market = FakeMarket::default()
            .with("IWM", FakeTicker::Listed { chain: chain_with(0), closes: rising() })
            .with("NFLX", FakeTicker::Listed { chain: None, closes: rising() });
        let (scanner, history) = scanner(market, &["IWM", "NFLX"]);

        let earlier = ScanResult {
            ticker: "IWM".to_string(),
            rsi: 30.0,
            contracts: Vec::new(),
            scanned_at: Utc::now(),
        };
        history.push(earlier).await;

        assert!(matches!(scanner.scan_ticker("IWM").await, Ok(TickerOutcome::NoUnusualFlow)));
        assert!(matches!(scanner.scan_ticker("NFLX").await, Ok(TickerOutcome::NoUnusualFlow)));
        let results = history.snapshot().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rsi, 30.0);
    }

    #[tokio::test]
    async fn test_neutral_momentum_is_not_recorded() {
        let market = FakeMarket::default()
            .with("SPY", FakeTicker::Listed { chain: chain_with(3), closes: choppy() });
        let (scanner, history) = scanner(market, &["SPY"]);

        match scanner.scan_ticker("SPY").await {
            Ok(TickerOutcome::NeutralMomentum { rsi }) => assert_eq!(rsi, 50.0),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(history.is_empty().await);
    }

    #[tokio::test]
    async fn test_flat_prices_read_as_oversold() {
        let market = FakeMarket::default()
            .with("SPY", FakeTicker::Listed { chain: chain_with(1), closes: vec![100.0; 20] });
        let (scanner, _history) = scanner(market, &["SPY"]);

        match scanner.scan_ticker("SPY").await {
            Ok(TickerOutcome::Recorded(result)) => assert_eq!(result.rsi, 30.0),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_keeps_first_five_contracts_in_order() {
        let market = FakeMarket::default()
            .with("SPY", FakeTicker::Listed { chain: chain_with(8), closes: rising() });
        let (scanner, _history) = scanner(market, &["SPY"]);

        let Ok(TickerOutcome::Recorded(result)) = scanner.scan_ticker("SPY").await else {
            panic!("expected a recorded hit");
        };
        let strikes: Vec<f64> = result.contracts.iter().map(|c| c.contract.strike).collect();
        assert_eq!(strikes, vec![100.0, 101.0, 102.0, 103.0, 104.0]);
        assert!(result.contracts.iter().all(|c| c.premium == 250_000.0));
    }

    #[tokio::test]
    async fn test_hit_is_announced() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let market = FakeMarket::default()
            .with("TSLA", FakeTicker::Listed { chain: chain_with(2), closes: rising() });
        let (scanner, _history) = scanner(market, &["TSLA"]);
        let scanner = scanner.with_notifier(NotificationService::with_channels(vec![Box::new(Recorder(
            Arc::clone(&sent),
        ))]));

        scanner.scan_ticker("TSLA").await.unwrap();

        for _ in 0..50 {
            if !sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("TSLA"));
        assert!(sent[0].contains("overbought"));
        assert!(sent[0].contains("$500000 premium"));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let market = FakeMarket::default()
            .with("SPY", FakeTicker::Listed { chain: chain_with(1), closes: rising() });
        let history = Arc::new(ScanHistory::new(50));
        let config = ScannerConfig {
            scan_interval_seconds: 3600,
            ..config(&["SPY"])
        };
        let scanner = FlowScanner::new(config, Arc::new(market), Arc::clone(&history));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scanner.run(rx));

        for _ in 0..100 {
            if !history.is_empty().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(history.len().await, 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scanner should stop promptly")
            .unwrap();
    }
}
