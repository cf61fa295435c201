use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use common::Notifier;

/// Outbound-only Telegram notifier using the Bot API `sendMessage` call.
///
/// Fire-and-forget: delivery failures are logged and swallowed so a
/// Telegram outage can never stall or abort a trading cycle.
pub struct TelegramNotifier {
    http: Client,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            http: Client::builder()
                .use_rustls_tls()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let payload = json!({
            "chat_id": self.chat_id,
            "text": text,
        });

        match self.http.post(&url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("notification delivered");
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "Telegram rejected notification");
            }
            Err(e) => {
                warn!(error = %e, "failed to deliver notification");
            }
        }
    }
}

/// Notifier that drops everything. Useful when no Telegram credentials are
/// configured and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, text: &str) {
        debug!(text, "notification suppressed");
    }
}
