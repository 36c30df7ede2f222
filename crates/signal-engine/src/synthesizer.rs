use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use analysis_core::{
    AnalysisError, ClassificationRequest, MarketClassifier, MarketDataSource, NewsSource, Signal,
    UnusualFlowEntry,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use options_flow::UnusualFlowDetector;
use serde::{Deserialize, Serialize};
use technical_analysis::{closes, rsi, DEFAULT_RSI_PERIOD, RSI_INSUFFICIENT_DATA};

use crate::levels::build_signal;

const HEADLINE_CACHE_TTL_SECS: i64 = 300;
/// Most tickers held in the headline cache at once.
const HEADLINE_CACHE_MAX_ENTRIES: usize = 256;
const HEADLINE_LIMIT: usize = 5;
/// RSI is only trusted above this many closes; below it the signal path reads 50.
const MIN_CLOSES_FOR_RSI: usize = 15;

struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

/// Everything gathered for one ticker before classification.
#[derive(Debug, Clone)]
pub struct SignalInputs {
    pub price: f64,
    pub rsi: f64,
    pub flow: Vec<UnusualFlowEntry>,
    pub headlines: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SignalReport {
    pub signal: Signal,
    /// Classifier summary; `None` when synthesis degraded.
    pub summary: Option<String>,
    pub degraded: bool,
}

impl SignalReport {
    fn degraded() -> Self {
        Self {
            signal: Signal::neutral(),
            summary: None,
            degraded: true,
        }
    }
}

/// A synthesized signal kept for `/signals`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRecord {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub signal: Signal,
}

pub struct SignalSynthesizer {
    market_data: Arc<dyn MarketDataSource>,
    news: Arc<dyn NewsSource>,
    classifier: Arc<dyn MarketClassifier>,
    detector: UnusualFlowDetector,
    rsi_period: usize,
    fetch_timeout: Duration,
    /// Headlines per ticker (5-min TTL)
    headline_cache: DashMap<String, CacheEntry<Vec<String>>>,
}

impl SignalSynthesizer {
    pub fn new(
        market_data: Arc<dyn MarketDataSource>,
        news: Arc<dyn NewsSource>,
        classifier: Arc<dyn MarketClassifier>,
    ) -> Self {
        Self {
            market_data,
            news,
            classifier,
            detector: UnusualFlowDetector::default(),
            rsi_period: DEFAULT_RSI_PERIOD,
            fetch_timeout: Duration::from_secs(20),
            headline_cache: DashMap::new(),
        }
    }

    pub fn with_detector(mut self, detector: UnusualFlowDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_rsi_period(mut self, period: usize) -> Self {
        self.rsi_period = period;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    async fn bounded<T, F>(&self, what: &str, ticker: &str, fut: F) -> Result<T, AnalysisError>
    where
        F: Future<Output = Result<T, AnalysisError>>,
    {
        tokio::time::timeout(self.fetch_timeout, fut)
            .await
            .map_err(|_| AnalysisError::Timeout(format!("{} for {}", what, ticker)))?
    }

    /// Unusual flow for the nearest expiration; empty when nothing is listed.
    pub async fn unusual_flow(&self, ticker: &str) -> Result<Vec<UnusualFlowEntry>, AnalysisError> {
        let chain = self
            .bounded("option chain", ticker, self.market_data.nearest_chain(ticker))
            .await?;
        Ok(chain.map(|c| self.detector.detect(&c)).unwrap_or_default())
    }

    /// Recent headlines (cached, 5-min TTL)
    pub async fn headlines(&self, ticker: &str) -> Result<Vec<String>, AnalysisError> {
        let cache_key = ticker.to_uppercase();
        if let Some(entry) = self.headline_cache.get(&cache_key) {
            let age = (Utc::now() - entry.cached_at).num_seconds();
            if age < HEADLINE_CACHE_TTL_SECS {
                return Ok(entry.data.clone());
            }
        }

        let headlines = self
            .bounded("headlines", ticker, self.news.headlines(ticker, HEADLINE_LIMIT))
            .await?;
        self.make_room_in_headline_cache(&cache_key);
        self.headline_cache.insert(
            cache_key,
            CacheEntry {
                data: headlines.clone(),
                cached_at: Utc::now(),
            },
        );

        Ok(headlines)
    }

    /// Drop expired entries, then the oldest ones until `incoming` fits under the cap.
    fn make_room_in_headline_cache(&self, incoming: &str) {
        let now = Utc::now();
        self.headline_cache
            .retain(|_, entry| (now - entry.cached_at).num_seconds() < HEADLINE_CACHE_TTL_SECS);

        while self.headline_cache.len() >= HEADLINE_CACHE_MAX_ENTRIES
            && !self.headline_cache.contains_key(incoming)
        {
            let oldest = self
                .headline_cache
                .iter()
                .min_by_key(|entry| entry.value().cached_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.headline_cache.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Fetch flow, headlines and bars concurrently.
    pub async fn gather(&self, ticker: &str) -> Result<SignalInputs, AnalysisError> {
        let (flow, headlines, bars) = tokio::join!(
            self.unusual_flow(ticker),
            self.headlines(ticker),
            self.bounded("intraday bars", ticker, self.market_data.intraday_bars(ticker)),
        );
        let (flow, headlines, bars) = (flow?, headlines?, bars?);

        let closes = closes(&bars);
        let price = closes.last().copied().unwrap_or(0.0);
        let rsi = if closes.len() > MIN_CLOSES_FOR_RSI {
            rsi(&closes, self.rsi_period)
        } else {
            RSI_INSUFFICIENT_DATA
        };

        Ok(SignalInputs {
            price,
            rsi,
            flow,
            headlines,
        })
    }

    pub async fn synthesize(&self, ticker: &str) -> SignalReport {
        let inputs = match self.gather(ticker).await {
            Ok(inputs) => inputs,
            Err(e) => {
                tracing::error!(ticker = %ticker, error = %e, "Signal inputs unavailable, returning neutral");
                return SignalReport::degraded();
            }
        };

        let request = ClassificationRequest {
            ticker: ticker.to_string(),
            price: inputs.price,
            rsi: inputs.rsi,
            flow: inputs.flow,
            headlines: inputs.headlines,
        };

        match self.classifier.classify(&request).await {
            Ok(verdict) => {
                let signal = build_signal(request.price, &verdict);
                tracing::info!(
                    ticker = %ticker,
                    bias = ?signal.bias,
                    confidence = signal.confidence,
                    price = signal.price,
                    "Signal synthesized"
                );
                SignalReport {
                    signal,
                    summary: Some(verdict.summary),
                    degraded: false,
                }
            }
            Err(e) => {
                tracing::error!(ticker = %ticker, error = %e, "Classifier failed, returning neutral");
                SignalReport::degraded()
            }
        }
    }

    pub async fn signal(&self, ticker: &str) -> Signal {
        self.synthesize(ticker).await.signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Bar, Bias, MarketVerdict, OptionChain, OptionContract, OptionSide, Quote};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeMarket {
        closes: Vec<f64>,
        chain: Option<OptionChain>,
        fail: bool,
    }

    impl FakeMarket {
        fn new(closes: Vec<f64>) -> Self {
            Self {
                closes,
                chain: Some(OptionChain {
                    calls: vec![OptionContract {
                        strike: 100.0,
                        last_price: 10.0,
                        volume: 250,
                        open_interest: 100,
                        implied_volatility: 0.3,
                        side: OptionSide::Call,
                    }],
                    puts: Vec::new(),
                }),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl MarketDataSource for FakeMarket {
        async fn expirations(&self, _ticker: &str) -> Result<Vec<NaiveDate>, AnalysisError> {
            Ok(Vec::new())
        }

        async fn option_chain(&self, _ticker: &str, _expiration: NaiveDate) -> Result<OptionChain, AnalysisError> {
            Ok(OptionChain::default())
        }

        async fn intraday_bars(&self, _ticker: &str) -> Result<Vec<Bar>, AnalysisError> {
            if self.fail {
                return Err(AnalysisError::ApiError("chart unavailable".to_string()));
            }
            Ok(self
                .closes
                .iter()
                .map(|&close| Bar {
                    timestamp: Utc::now(),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1_000.0,
                })
                .collect())
        }

        async fn quote(&self, ticker: &str) -> Result<Quote, AnalysisError> {
            Ok(Quote {
                symbol: ticker.to_string(),
                price: None,
                change: None,
                volume: None,
            })
        }

        async fn nearest_chain(&self, _ticker: &str) -> Result<Option<OptionChain>, AnalysisError> {
            Ok(self.chain.clone())
        }
    }

    #[derive(Default)]
    struct FakeNews {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NewsSource for FakeNews {
        async fn headlines(&self, ticker: &str, limit: usize) -> Result<Vec<String>, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..limit).map(|i| format!("{} headline {}", ticker, i)).collect())
        }
    }

    enum Answer {
        Verdict(MarketVerdict),
        Fail,
    }

    struct FakeClassifier {
        answer: Answer,
        seen: Mutex<Vec<ClassificationRequest>>,
    }

    impl FakeClassifier {
        fn answering(answer: Answer) -> Arc<Self> {
            Arc::new(Self {
                answer,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MarketClassifier for FakeClassifier {
        async fn classify(&self, request: &ClassificationRequest) -> Result<MarketVerdict, AnalysisError> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.answer {
                Answer::Verdict(v) => Ok(v.clone()),
                Answer::Fail => Err(AnalysisError::ClassifierError("HTTP 500".to_string())),
            }
        }
    }

    fn verdict(bias: Bias, confidence: u8) -> MarketVerdict {
        MarketVerdict {
            bias,
            confidence,
            summary: "flow confirms trend".to_string(),
            reasons: vec!["RSI extreme".to_string()],
            suggested_trades: Vec::new(),
        }
    }

    fn rising_to_100() -> Vec<f64> {
        (0..20).map(|i| 81.0 + i as f64).collect()
    }

    fn synthesizer(market: FakeMarket, news: Arc<FakeNews>, classifier: Arc<FakeClassifier>) -> SignalSynthesizer {
        SignalSynthesizer::new(Arc::new(market), news, classifier)
    }

    #[tokio::test]
    async fn test_calls_signal_from_last_close() {
        let classifier = FakeClassifier::answering(Answer::Verdict(verdict(Bias::Calls, 80)));
        let engine = synthesizer(FakeMarket::new(rising_to_100()), Arc::default(), classifier.clone());

        let report = engine.synthesize("SPY").await;

        assert!(!report.degraded);
        assert_eq!(report.summary.as_deref(), Some("flow confirms trend"));
        assert_eq!(
            report.signal,
            Signal {
                bias: Bias::Calls,
                confidence: 80,
                price: 100.0,
                stop: 99.0,
                target: 102.0,
            }
        );

        let seen = classifier.seen.lock().unwrap();
        assert_eq!(seen[0].rsi, 70.0);
        assert_eq!(seen[0].flow.len(), 1);
        assert_eq!(seen[0].headlines.len(), 5);
    }

    #[tokio::test]
    async fn test_puts_signal_levels() {
        let classifier = FakeClassifier::answering(Answer::Verdict(verdict(Bias::Puts, 65)));
        let engine = synthesizer(FakeMarket::new(rising_to_100()), Arc::default(), classifier);

        let signal = engine.signal("TSLA").await;
        assert_eq!(signal.bias, Bias::Puts);
        assert_eq!(signal.stop, 101.0);
        assert_eq!(signal.target, 98.0);
    }

    #[tokio::test]
    async fn test_classifier_failure_is_fully_zeroed() {
        let classifier = FakeClassifier::answering(Answer::Fail);
        let engine = synthesizer(FakeMarket::new(rising_to_100()), Arc::default(), classifier);

        let report = engine.synthesize("SPY").await;
        assert!(report.degraded);
        assert!(report.summary.is_none());
        assert_eq!(report.signal, Signal::neutral());
    }

    #[tokio::test]
    async fn test_unstructured_verdict_keeps_price_levels() {
        let classifier = FakeClassifier::answering(Answer::Verdict(MarketVerdict::unstructured("no idea")));
        let engine = synthesizer(FakeMarket::new(rising_to_100()), Arc::default(), classifier);

        let report = engine.synthesize("SPY").await;
        assert!(!report.degraded);
        assert_eq!(report.signal.bias, Bias::Neutral);
        assert_eq!(report.signal.confidence, 0);
        assert_eq!(report.signal.price, 100.0);
        assert_eq!(report.signal.stop, 99.0);
        assert_eq!(report.summary.as_deref(), Some("no idea"));
    }

    #[tokio::test]
    async fn test_market_failure_is_fully_zeroed() {
        let classifier = FakeClassifier::answering(Answer::Verdict(verdict(Bias::Calls, 90)));
        let mut market = FakeMarket::new(rising_to_100());
        market.fail = true;
        let engine = synthesizer(market, Arc::default(), classifier.clone());

        assert_eq!(engine.signal("SPY").await, Signal::neutral());
        assert!(classifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_short_series_reads_neutral_rsi() {
        let classifier = FakeClassifier::answering(Answer::Verdict(verdict(Bias::Neutral, 10)));
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let engine = synthesizer(FakeMarket::new(closes), Arc::default(), classifier.clone());

        engine.synthesize("IWM").await;
        assert_eq!(classifier.seen.lock().unwrap()[0].rsi, 50.0);
    }

    #[tokio::test]
    async fn test_no_bars_prices_at_zero() {
        let classifier = FakeClassifier::answering(Answer::Verdict(verdict(Bias::Calls, 40)));
        let engine = synthesizer(FakeMarket::new(Vec::new()), Arc::default(), classifier);

        let signal = engine.signal("NFLX").await;
        assert_eq!(signal.price, 0.0);
        assert_eq!(signal.stop, 0.0);
        assert_eq!(signal.confidence, 40);
    }

    #[tokio::test]
    async fn test_no_expirations_classifies_with_empty_flow() {
        let classifier = FakeClassifier::answering(Answer::Verdict(verdict(Bias::Calls, 55)));
        let mut market = FakeMarket::new(rising_to_100());
        market.chain = None;
        let engine = synthesizer(market, Arc::default(), classifier.clone());

        let report = engine.synthesize("SPY").await;
        assert!(!report.degraded);
        assert!(classifier.seen.lock().unwrap()[0].flow.is_empty());
    }

    #[tokio::test]
    async fn test_headlines_are_cached_per_ticker() {
        let news = Arc::new(FakeNews::default());
        let classifier = FakeClassifier::answering(Answer::Verdict(verdict(Bias::Calls, 55)));
        let engine = synthesizer(FakeMarket::new(rising_to_100()), news.clone(), classifier);

        engine.synthesize("SPY").await;
        engine.synthesize("spy").await;
        engine.synthesize("TSLA").await;

        assert_eq!(news.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_headline_cache_stays_bounded_across_many_tickers() {
        let news = Arc::new(FakeNews::default());
        let classifier = FakeClassifier::answering(Answer::Verdict(verdict(Bias::Calls, 55)));
        let engine = synthesizer(FakeMarket::new(rising_to_100()), news.clone(), classifier);

        for i in 0..2000 {
            engine.synthesize(&format!("ZZ{}", i)).await;
        }

        assert_eq!(news.calls.load(Ordering::SeqCst), 2000);
        assert!(engine.headline_cache.len() <= HEADLINE_CACHE_MAX_ENTRIES);
        assert!(engine.headline_cache.contains_key("ZZ1999"));
    }

    #[tokio::test]
    async fn test_expired_headlines_are_evicted_on_insert() {
        let classifier = FakeClassifier::answering(Answer::Verdict(verdict(Bias::Calls, 55)));
        let engine = synthesizer(FakeMarket::new(rising_to_100()), Arc::default(), classifier);

        engine.headline_cache.insert(
            "OLD".to_string(),
            CacheEntry {
                data: vec!["stale".to_string()],
                cached_at: Utc::now() - chrono::Duration::seconds(HEADLINE_CACHE_TTL_SECS + 1),
            },
        );
        engine.synthesize("SPY").await;

        assert!(!engine.headline_cache.contains_key("OLD"));
        assert!(engine.headline_cache.contains_key("SPY"));
    }
}
