//! Chat replies via the Telegram Bot API `sendMessage` method.

use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::Serialize;

/// Delivers formatted text to a chat.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `text` (Telegram HTML) to `chat_id`.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_notification: bool,
}

/// Telegram implementation of Notifier.
#[derive(Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    /// `{api_url}/bot{token}`
    bot_url: String,
}

impl TelegramNotifier {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            bot_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/sendMessage", self.bot_url))
            .json(&SendMessageRequest {
                chat_id,
                text: text.trim(),
                parse_mode: "HTML",
                disable_notification: true,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("sendMessage returned {}: {}", status, body);
        }

        tracing::debug!(chat_id, "telegram message sent");

        Ok(())
    }
}
