use analysis_core::{
    AnalysisError, Bias, ClassificationRequest, MarketClassifier, MarketVerdict, SuggestedTrade,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LlmError, LlmResult};
use crate::prompt::{build_user_prompt, SYSTEM_PROMPT};
use crate::LlmConfig;

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<InputMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesReply {
    fn text(self) -> String {
        if let Some(text) = self.output_text {
            return text;
        }
        self.output
            .into_iter()
            .flat_map(|item| item.content)
            .filter(|c| c.kind == "output_text")
            .filter_map(|c| c.text)
            .collect()
    }
}

/// Market classifier backed by the OpenAI Responses API.
#[derive(Clone)]
pub struct OpenAiClassifier {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiClassifier {
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, config }
    }

    pub fn with_defaults() -> Self {
        Self::new(LlmConfig::default())
    }

    pub fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    /// Raw model output for `request`.
    pub async fn complete(&self, request: &ClassificationRequest) -> LlmResult<String> {
        if !self.is_configured() {
            return Err(LlmError::NotConfigured("OPENAI_API_KEY not set".to_string()));
        }

        let user_prompt = build_user_prompt(request);
        let body = ResponsesRequest {
            model: &self.config.model,
            input: vec![
                InputMessage { role: "system", content: SYSTEM_PROMPT },
                InputMessage { role: "user", content: &user_prompt },
            ],
        };

        let response = self
            .client
            .post(format!("{}/responses", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LlmError::ServiceUnavailable(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let reply: ResponsesReply = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(reply.text())
    }
}

#[async_trait]
impl MarketClassifier for OpenAiClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> Result<MarketVerdict, AnalysisError> {
        let raw = self.complete(request).await?;
        Ok(parse_verdict(&raw))
    }
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    bias: Option<String>,
    #[serde(default)]
    confidence: Option<Value>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    reasons: Option<Vec<String>>,
    #[serde(default)]
    suggested_trades: Option<Vec<SuggestedTrade>>,
}

/// Parse model output into a verdict.
///
/// Output that is not the expected JSON object becomes a neutral,
/// zero-confidence verdict carrying the raw text as its summary.
pub fn parse_verdict(raw: &str) -> MarketVerdict {
    match serde_json::from_str::<RawVerdict>(strip_code_fence(raw)) {
        Ok(v) => MarketVerdict {
            bias: v.bias.as_deref().map(Bias::parse).unwrap_or_default(),
            confidence: v.confidence.as_ref().map(confidence_from).unwrap_or(0),
            summary: v.summary.unwrap_or_default(),
            reasons: v.reasons.unwrap_or_default(),
            suggested_trades: v.suggested_trades.unwrap_or_default(),
        },
        Err(e) => {
            tracing::warn!("Classifier returned unstructured output: {}", e);
            MarketVerdict::unstructured(raw)
        }
    }
}

fn confidence_from(value: &Value) -> u8 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() {
        n.round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}
