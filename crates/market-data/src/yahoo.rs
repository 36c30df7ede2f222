//! Yahoo Finance data fetcher
//!
//! Option chains come from the v7 options endpoint, bars and quotes from the
//! v8 chart endpoint. Data is delayed and intended for personal use.

use analysis_core::{
    AnalysisError, Bar, MarketDataSource, OptionChain, OptionContract, OptionSide, Quote,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::rate_limit::RateLimiter;

const OPTIONS_URL: &str = "https://query2.finance.yahoo.com/v7/finance/options";
const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    rate_limiter: RateLimiter,
}

impl YahooClient {
    pub fn new(timeout: Duration) -> Self {
        let rate_limit: usize = std::env::var("YAHOO_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120);

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            rate_limiter: RateLimiter::new("Yahoo", rate_limit, Duration::from_secs(60)),
        }
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, AnalysisError> {
        let request = builder.build().map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| AnalysisError::ApiError("Cannot clone request".to_string()))?;
            let response = self.client.execute(req_clone).await.map_err(transport_error)?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 5u64 * (attempt as u64 + 1);
            tracing::warn!("Yahoo 429 rate limited, waiting {}s before retry {}/3", wait_secs, attempt + 1);
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(AnalysisError::ApiError("Rate limited by Yahoo after 3 retries".to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, AnalysisError> {
        let response = self.send_request(self.client.get(url).query(query)).await?;

        if !response.status().is_success() {
            return Err(AnalysisError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        response.json().await.map_err(|e| AnalysisError::InvalidData(e.to_string()))
    }

    async fn options_response(
        &self,
        ticker: &str,
        expiration: Option<NaiveDate>,
    ) -> Result<Option<YahooOptionChainData>, AnalysisError> {
        let url = format!("{}/{}", OPTIONS_URL, ticker);
        let query: Vec<(&str, String)> = match expiration {
            Some(date) => vec![("date", expiration_timestamp(date).to_string())],
            None => Vec::new(),
        };

        let response: YahooOptionsResponse = self.get_json(&url, &query).await?;
        Ok(response.option_chain.result.into_iter().next())
    }

    async fn chart(&self, ticker: &str, range: &str, interval: &str) -> Result<YahooChartData, AnalysisError> {
        let url = format!("{}/{}", CHART_URL, ticker);
        let response: YahooChartResponse = self
            .get_json(&url, &[("range", range.to_string()), ("interval", interval.to_string())])
            .await?;

        response
            .chart
            .result
            .into_iter()
            .next()
            .ok_or_else(|| AnalysisError::InvalidData(format!("No chart data returned for {}", ticker)))
    }
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

#[async_trait]
impl MarketDataSource for YahooClient {
    async fn expirations(&self, ticker: &str) -> Result<Vec<NaiveDate>, AnalysisError> {
        Ok(self
            .options_response(ticker, None)
            .await?
            .map(|data| data.expirations())
            .unwrap_or_default())
    }

    async fn option_chain(&self, ticker: &str, expiration: NaiveDate) -> Result<OptionChain, AnalysisError> {
        Ok(self
            .options_response(ticker, Some(expiration))
            .await?
            .map(|data| data.first_chain())
            .unwrap_or_default())
    }

    async fn intraday_bars(&self, ticker: &str) -> Result<Vec<Bar>, AnalysisError> {
        Ok(self.chart(ticker, "1d", "5m").await?.bars())
    }

    async fn quote(&self, ticker: &str) -> Result<Quote, AnalysisError> {
        let chart = self.chart(ticker, "1d", "1d").await?;
        Ok(chart.meta.to_quote(ticker))
    }

    /// The undated options call already returns the nearest expiration.
    async fn nearest_chain(&self, ticker: &str) -> Result<Option<OptionChain>, AnalysisError> {
        Ok(self
            .options_response(ticker, None)
            .await?
            .filter(|data| !data.expiration_dates.is_empty())
            .map(|data| data.first_chain()))
    }
}

fn transport_error(e: reqwest::Error) -> AnalysisError {
    if e.is_timeout() {
        AnalysisError::Timeout(e.to_string())
    } else {
        AnalysisError::ApiError(e.to_string())
    }
}

/// Yahoo keys expirations by midnight UTC of the expiry date.
fn expiration_timestamp(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

// Yahoo Finance API response structures

#[derive(Debug, Deserialize)]
struct YahooOptionsResponse {
    #[serde(rename = "optionChain")]
    option_chain: YahooOptionChain,
}

#[derive(Debug, Deserialize)]
struct YahooOptionChain {
    #[serde(default)]
    result: Vec<YahooOptionChainData>,
}

#[derive(Debug, Deserialize)]
struct YahooOptionChainData {
    #[serde(rename = "expirationDates", default)]
    expiration_dates: Vec<i64>,
    #[serde(default)]
    options: Vec<YahooOptions>,
}

impl YahooOptionChainData {
    fn expirations(&self) -> Vec<NaiveDate> {
        self.expiration_dates
            .iter()
            .filter_map(|&ts| DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive()))
            .collect()
    }

    fn first_chain(self) -> OptionChain {
        match self.options.into_iter().next() {
            Some(options) => OptionChain {
                calls: options.calls.iter().map(|c| c.to_contract(OptionSide::Call)).collect(),
                puts: options.puts.iter().map(|p| p.to_contract(OptionSide::Put)).collect(),
            },
            None => OptionChain::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct YahooOptions {
    #[serde(default)]
    calls: Vec<YahooOptionData>,
    #[serde(default)]
    puts: Vec<YahooOptionData>,
}

#[derive(Debug, Deserialize)]
struct YahooOptionData {
    strike: Option<f64>,
    #[serde(rename = "lastPrice")]
    last_price: Option<f64>,
    volume: Option<i64>,
    #[serde(rename = "openInterest")]
    open_interest: Option<i64>,
    #[serde(rename = "impliedVolatility")]
    implied_volatility: Option<f64>,
}

impl YahooOptionData {
    /// Missing fields read as zero.
    fn to_contract(&self, side: OptionSide) -> OptionContract {
        OptionContract {
            strike: self.strike.unwrap_or(0.0),
            last_price: self.last_price.unwrap_or(0.0),
            volume: self.volume.unwrap_or(0).max(0) as u64,
            open_interest: self.open_interest.unwrap_or(0).max(0) as u64,
            implied_volatility: self.implied_volatility.unwrap_or(0.0).max(0.0),
            side,
        }
    }
}

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    #[serde(default)]
    result: Vec<YahooChartData>,
}

#[derive(Debug, Deserialize)]
struct YahooChartData {
    meta: YahooChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: YahooIndicators,
}

impl YahooChartData {
    /// Bars in timestamp order; rows with any missing OHLCV field are skipped.
    fn bars(&self) -> Vec<Bar> {
        let Some(q) = self.indicators.quote.first() else {
            return Vec::new();
        };

        let mut bars: Vec<Bar> = self
            .timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| {
                Some(Bar {
                    timestamp: DateTime::from_timestamp(ts, 0)?,
                    open: (*q.open.get(i)?)?,
                    high: (*q.high.get(i)?)?,
                    low: (*q.low.get(i)?)?,
                    close: (*q.close.get(i)?)?,
                    volume: (*q.volume.get(i)?)?,
                })
            })
            .collect();

        bars.sort_by_key(|b| b.timestamp);
        bars
    }
}

#[derive(Debug, Deserialize)]
struct YahooChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(rename = "chartPreviousClose")]
    chart_previous_close: Option<f64>,
    #[serde(rename = "regularMarketVolume")]
    regular_market_volume: Option<u64>,
}

impl YahooChartMeta {
    fn to_quote(&self, ticker: &str) -> Quote {
        let change = match (self.regular_market_price, self.chart_previous_close) {
            (Some(price), Some(prev)) if prev > 0.0 => Some((price - prev) / prev * 100.0),
            _ => None,
        };

        Quote {
            symbol: ticker.to_string(),
            price: self.regular_market_price,
            change,
            volume: self.regular_market_volume,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct YahooIndicators {
    #[serde(default)]
    quote: Vec<YahooQuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct YahooQuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}
