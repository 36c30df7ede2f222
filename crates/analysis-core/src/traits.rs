use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{AnalysisError, Bar, ClassificationRequest, MarketVerdict, OptionChain, Quote};

/// Source of prices and option chains.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Listed expirations, nearest first.
    async fn expirations(&self, ticker: &str) -> Result<Vec<NaiveDate>, AnalysisError>;

    async fn option_chain(
        &self,
        ticker: &str,
        expiration: NaiveDate,
    ) -> Result<OptionChain, AnalysisError>;

    /// One trading day of 5-minute bars, oldest first.
    async fn intraday_bars(&self, ticker: &str) -> Result<Vec<Bar>, AnalysisError>;

    async fn quote(&self, ticker: &str) -> Result<Quote, AnalysisError>;

    /// Chain for the nearest expiration, or `None` when nothing is listed.
    async fn nearest_chain(&self, ticker: &str) -> Result<Option<OptionChain>, AnalysisError> {
        let expirations = self.expirations(ticker).await?;
        match expirations.first() {
            Some(&expiration) => Ok(Some(self.option_chain(ticker, expiration).await?)),
            None => Ok(None),
        }
    }
}

/// Source of recent headlines for a ticker.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn headlines(&self, ticker: &str, limit: usize) -> Result<Vec<String>, AnalysisError>;
}

/// Turns flow, momentum and news into a directional verdict.
#[async_trait]
pub trait MarketClassifier: Send + Sync {
    async fn classify(&self, request: &ClassificationRequest) -> Result<MarketVerdict, AnalysisError>;
}
