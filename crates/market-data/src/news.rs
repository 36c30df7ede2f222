use analysis_core::{AnalysisError, NewsSource};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const BASE_URL: &str = "https://newsapi.org/v2/everything";

/// NewsAPI headline search, keyed by ticker symbol.
#[derive(Clone)]
pub struct NewsApiClient {
    api_key: String,
    client: Client,
}

impl NewsApiClient {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { api_key, client }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn headlines(&self, ticker: &str, limit: usize) -> Result<Vec<String>, AnalysisError> {
        if !self.is_configured() {
            return Err(AnalysisError::NotConfigured("NEWS_API_KEY not set".to_string()));
        }

        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("q", ticker.to_string()),
                ("pageSize", limit.to_string()),
                ("apiKey", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalysisError::Timeout(e.to_string())
                } else {
                    AnalysisError::ApiError(e.to_string())
                }
            })?;

        let body: NewsResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidData(e.to_string()))?;

        Ok(body.into_headlines(ticker, limit))
    }
}

// NewsAPI replies 200 or 4xx with the same envelope; errors carry no articles.
#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsArticleResult>,
}

#[derive(Debug, Deserialize)]
struct NewsArticleResult {
    title: Option<String>,
}

impl NewsResponse {
    fn into_headlines(self, ticker: &str, limit: usize) -> Vec<String> {
        if self.status == "error" {
            tracing::warn!(
                ticker,
                "NewsAPI returned an error: {}",
                self.message.as_deref().unwrap_or("unknown")
            );
        }

        self.articles
            .into_iter()
            .filter_map(|a| a.title)
            .filter(|t| !t.trim().is_empty())
            .take(limit)
            .collect()
    }
}
