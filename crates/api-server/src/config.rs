use anyhow::{Context, Result};
use std::env;

/// HTTP surface settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `*` allows any origin.
    pub cors_allowed_origins: Vec<String>,
    pub signal_history_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_allowed_origins: vec!["*".to_string()],
            signal_history_capacity: 100,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("API_PORT must be a port number")?,
            cors_allowed_origins: parse_origins(
                &env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
            ),
            signal_history_capacity: env::var("SIGNAL_HISTORY_CAPACITY")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if origins.is_empty() {
        vec!["*".to_string()]
    } else {
        origins
    }
}
