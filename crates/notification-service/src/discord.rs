use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::{NotificationChannel, NotificationError};

/// Discord webhook notifier.
pub struct DiscordWebhookNotifier {
    client: Client,
    webhook_url: String,
    username: String,
}

impl DiscordWebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            webhook_url,
            username: "Flow Scanner".to_string(),
        }
    }
}

#[async_trait]
impl NotificationChannel for DiscordWebhookNotifier {
    async fn send(&self, message: &str) -> Result<(), NotificationError> {
        let payload = json!({
            "content": message,
            "username": self.username,
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Discord(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::Discord(format!("HTTP {}", response.status())));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "discord-webhook"
    }
}
