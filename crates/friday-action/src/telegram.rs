//! Telegram Bot API delivery.

use std::time::Duration;

use async_trait::async_trait;
use friday_core::config::TelegramConfig;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::NotifyError;
use crate::notifier::{format_alert, Formatting, Notifier};

/// Telegram rejects messages longer than 4096 characters.
const MAX_CHUNK_CHARS: usize = 4000;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Sends notifications through `sendMessage` on a bot.
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: String,
    timeout_secs: u64,
}

impl TelegramNotifier {
    /// Build from config. Fails when the bot token or chat id is missing.
    pub fn from_config(config: &TelegramConfig, timeout: Duration) -> Result<Self, NotifyError> {
        let (Some(token), Some(chat_id)) = (&config.bot_token, &config.chat_id) else {
            return Err(NotifyError::NotConfigured);
        };
        if !config.is_configured() {
            return Err(NotifyError::NotConfigured);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: token.clone(),
            chat_id: chat_id.clone(),
            timeout_secs: timeout.as_secs(),
        })
    }

    fn url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    async fn post(&self, text: &str, parse_mode: Option<&str>) -> Result<ApiResponse, NotifyError> {
        let mut body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = serde_json::json!(mode);
        }

        let resp = self
            .client
            .post(self.url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout(self.timeout_secs)
                } else {
                    NotifyError::Http(e.to_string())
                }
            })?;
        resp.json::<ApiResponse>()
            .await
            .map_err(|e| NotifyError::Http(format!("invalid Telegram response: {}", e)))
    }

    /// Send one chunk. A Markdown rejection is retried as plain text.
    async fn send_chunk(&self, text: &str, formatting: Formatting) -> Result<i64, NotifyError> {
        let mut resp = self.post(text, formatting.parse_mode()).await?;
        if !resp.ok && formatting == Formatting::Markdown {
            warn!(
                error = resp.description.as_deref().unwrap_or("unknown"),
                "Telegram rejected Markdown, retrying as plain text"
            );
            resp = self.post(text, None).await?;
        }
        if !resp.ok {
            return Err(NotifyError::Rejected(
                resp.description.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        resp.result
            .map(|m| m.message_id)
            .ok_or_else(|| NotifyError::Rejected("response carried no message id".to_string()))
    }

    async fn send_all(&self, text: &str, formatting: Formatting) -> Result<i64, NotifyError> {
        let mut first_id = None;
        for chunk in split_message(text, MAX_CHUNK_CHARS) {
            let id = self.send_chunk(&chunk, formatting).await?;
            first_id.get_or_insert(id);
        }
        debug!(chat_id = %self.chat_id, "Telegram message delivered");
        first_id.ok_or_else(|| NotifyError::Rejected("empty message".to_string()))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_message(&self, text: &str, formatting: Formatting) -> Result<(), NotifyError> {
        self.send_all(text, formatting).await.map(|_| ())
    }

    async fn send_alert(
        &self,
        title: &str,
        message: &str,
        _alert_key: Option<&str>,
        category: &str,
    ) -> Result<String, NotifyError> {
        let text = format_alert(title, message, category);
        self.send_all(&text, Formatting::Markdown)
            .await
            .map(|id| id.to_string())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

/// Split on character boundaries into chunks of at most `max_chars`.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|c| c.iter().collect::<String>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_token_and_chat() {
        let config = TelegramConfig::default();
        assert!(matches!(
            TelegramNotifier::from_config(&config, Duration::from_secs(5)),
            Err(NotifyError::NotConfigured)
        ));
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let config = TelegramConfig {
            bot_token: Some("123:abc".to_string()),
            chat_id: Some("42".to_string()),
            api_base: "https://api.telegram.org/".to_string(),
        };
        let notifier = TelegramNotifier::from_config(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(notifier.url(), "https://api.telegram.org/bot123:abc/sendMessage");
        assert_eq!(notifier.name(), "telegram");
    }

    #[test]
    fn test_split_message() {
        assert!(split_message("", 10).is_empty());
        assert_eq!(split_message("abc", 10), vec!["abc"]);
        let long = "é".repeat(25);
        let chunks = split_message(&long, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].chars().count(), 5);
    }

    #[test]
    fn test_api_response_parsing() {
        let ok: ApiResponse =
            serde_json::from_str(r#"{"ok":true,"result":{"message_id":77,"date":0}}"#).unwrap();
        assert!(ok.ok);
        assert_eq!(ok.result.unwrap().message_id, 77);

        let err: ApiResponse =
            serde_json::from_str(r#"{"ok":false,"description":"Bad Request: can't parse entities"}"#)
                .unwrap();
        assert!(!err.ok);
        assert!(err.description.unwrap().contains("parse entities"));
    }
}
