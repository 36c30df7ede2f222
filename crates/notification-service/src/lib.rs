mod discord;

pub use discord::DiscordWebhookNotifier;

use async_trait::async_trait;
use std::sync::Arc;

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

/// Errors from the notification system.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Discord webhook error: {0}")]
    Discord(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Configuration for the notification service.
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub discord_webhook_url: Option<String>,
}

impl NotificationConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        Self {
            discord_webhook_url: std::env::var("DISCORD_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}

/// Dispatches text messages to every configured channel. Delivery is
/// best-effort: failures are logged and dropped, never retried.
#[derive(Clone)]
pub struct NotificationService {
    channels: Arc<Vec<Box<dyn NotificationChannel>>>,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        if let Some(ref webhook_url) = config.discord_webhook_url {
            channels.push(Box::new(DiscordWebhookNotifier::new(webhook_url.clone())));
            tracing::info!("Discord webhook notifications enabled");
        } else {
            tracing::info!("No notification channels configured (set DISCORD_WEBHOOK_URL)");
        }

        Self::with_channels(channels)
    }

    pub fn with_channels(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self {
            channels: Arc::new(channels),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.channels.is_empty()
    }

    /// Fire-and-forget via `tokio::spawn`.
    pub fn notify(&self, message: impl Into<String>) {
        if !self.is_enabled() {
            return;
        }
        let service = self.clone();
        let message = message.into();
        tokio::spawn(async move {
            service.notify_and_wait(&message).await;
        });
    }

    /// Send to all channels, awaiting completion.
    pub async fn notify_and_wait(&self, message: &str) {
        for channel in self.channels.iter() {
            match channel.send(message).await {
                Ok(()) => tracing::debug!("Sent notification via {}", channel.name()),
                Err(e) => {
                    tracing::warn!("Failed to send notification via {}: {}", channel.name(), e)
                }
            }
        }
    }
}
