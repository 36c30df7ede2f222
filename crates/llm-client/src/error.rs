use analysis_core::AnalysisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

pub type LlmResult<T> = Result<T, LlmError>;

impl From<LlmError> for AnalysisError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::NotConfigured(msg) => AnalysisError::NotConfigured(msg),
            LlmError::RequestFailed(e) if e.is_timeout() => AnalysisError::Timeout(e.to_string()),
            other => AnalysisError::ClassifierError(other.to_string()),
        }
    }
}
