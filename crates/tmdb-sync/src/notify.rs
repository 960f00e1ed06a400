//! Operator notifications over a webhook
//!
//! Delivery never fails the caller: missing settings and exhausted retries
//! are only logged.

use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::WebhookConfig;

#[derive(Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    http: Client,
    config: WebhookConfig,
}

impl Notifier {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// A notifier that drops every message.
    pub fn disabled() -> Self {
        Self::new(WebhookConfig::default())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send `message`. Returns whether it was delivered.
    pub async fn notify(&self, message: &str) -> bool {
        if !self.config.enabled {
            return false;
        }

        let (Some(url), Some(username), Some(password)) = (
            self.config.url.as_deref(),
            self.config.username.as_deref(),
            self.config.password.as_deref(),
        ) else {
            error!("Webhook enabled but URL or credentials are missing");
            return false;
        };

        let attempts = self.config.max_attempts.max(1);
        let delay = Duration::from_secs(self.config.retry_delay_secs);
        let body = WebhookMessage { content: message };

        for attempt in 1..=attempts {
            let result = self
                .http
                .post(url)
                .basic_auth(username, Some(password))
                .json(&body)
                .send()
                .await;

            match result {
                Ok(response) if response.status() == StatusCode::OK => {
                    debug!(attempt, "Webhook delivered");
                    return true;
                },
                Ok(response) => {
                    warn!(attempt, status = %response.status(), "Webhook rejected, retrying");
                },
                Err(e) => warn!(attempt, error = %e, "Webhook request failed, retrying"),
            }

            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }

        warn!(attempts, "Webhook failed after all attempts");
        false
    }
}
