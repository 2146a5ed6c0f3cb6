//! Text-completion endpoint used for intent routing and answer synthesis.

use std::time::Duration;

use async_trait::async_trait;
use friday_core::config::LlmConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CompletionError;
use crate::types::Turn;

/// A chat-style language model.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Complete `user_content` given a system prompt and prior turns.
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &str,
        history: &[Turn],
    ) -> Result<String, CompletionError>;
}

/// Client for any OpenAI-compatible `/chat/completions` server (Ollama,
/// llama.cpp, vLLM, hosted APIs).
pub struct OpenAiCompletion {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompletion {
    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CompletionError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl Completion for OpenAiCompletion {
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &str,
        history: &[Turn],
    ) -> Result<String, CompletionError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(RequestMessage {
            role: "system",
            content: system_prompt,
        });
        messages.extend(history.iter().map(|turn| RequestMessage {
            role: turn.role.as_str(),
            content: &turn.content,
        }));
        messages.push(RequestMessage {
            role: "user",
            content: user_content,
        });

        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let mut request = self.client.post(self.url()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout(self.timeout_secs)
            } else {
                CompletionError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            return Err(CompletionError::Http(format!("{}: {}", status, snippet)));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(CompletionError::EmptyResponse)?;

        debug!(model = %self.model, chars = content.len(), "Completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_trims_base_url() {
        let config = LlmConfig {
            base_url: "http://localhost:11434/v1/".to_string(),
            api_key: Some(String::new()),
            ..Default::default()
        };
        let client = OpenAiCompletion::from_config(&config).unwrap();
        assert_eq!(client.url(), "http://localhost:11434/v1/chat/completions");
        assert!(client.api_key.is_none());
    }

    #[test]
    fn test_request_shape() {
        let history = [Turn::user("hi"), Turn::assistant("hello")];
        let mut messages = vec![RequestMessage {
            role: "system",
            content: "be brief",
        }];
        messages.extend(history.iter().map(|t| RequestMessage {
            role: t.role.as_str(),
            content: &t.content,
        }));
        let body = CompletionRequest {
            model: "m",
            messages,
            temperature: 0.3,
            max_tokens: 16,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][2]["role"], "assistant");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_response_parsing_tolerates_missing_content() {
        let parsed: CompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());

        let parsed: CompletionResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(parsed.choices.is_empty());
    }
}
