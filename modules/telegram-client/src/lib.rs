use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

pub type Result<T> = std::result::Result<T, TelegramError>;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Telegram API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        TelegramError::Network(err.to_string())
    }
}

/// Notifications are a side channel; a short timeout keeps a slow Telegram
/// API from ever holding up the pipeline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(bot_token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TelegramError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: format!("https://api.telegram.org/bot{bot_token}"),
        })
    }

    /// Send a Markdown-formatted message to a single chat.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let url = format!("{}/sendMessage", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&SendMessage {
                chat_id,
                text,
                parse_mode: "Markdown",
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TelegramError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(())
    }

    /// Broadcast to every configured chat. Per-chat failures are logged and
    /// counted, not propagated; one dead chat must not silence the rest.
    pub async fn broadcast(&self, chat_ids: &[i64], text: &str) -> usize {
        let mut delivered = 0;
        for &chat_id in chat_ids {
            match self.send_message(chat_id, text).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(chat_id, error = %e, "Telegram send failed"),
            }
        }
        delivered
    }
}
