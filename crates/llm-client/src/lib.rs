pub mod classifier;
pub mod error;
pub mod prompt;

pub use classifier::{parse_verdict, OpenAiClassifier};
pub use error::{LlmError, LlmResult};

use std::time::Duration;

/// Configuration for the OpenAI-backed classifier
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".to_string()),
            timeout: Duration::from_secs(30),
        }
    }
}
