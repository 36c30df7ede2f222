use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Classifier error: {0}")]
    ClassifierError(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}
