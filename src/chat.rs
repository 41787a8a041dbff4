//! AI text service client.
//!
//! The app sends a list of role-tagged messages and receives one completion.
//! [`ChatProvider`] is that contract; [`OpenAICompatibleProvider`] speaks
//! the `/chat/completions` dialect shared by OpenAI and most compatible
//! gateways, and [`DisabledProvider`] stands in when `[chat]` is off.
//!
//! # Retry Strategy
//!
//! - HTTP 429 and 5xx → retry
//! - other 4xx → fail immediately
//! - network errors → retry
//! - backoff 1s, 2s, 4s, … capped at 32s

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{ChatConfig, Config};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens: Option<TokenUsage>,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatResponse>;
}

/// Used when `chat.provider = "disabled"`. Every request fails.
pub struct DisabledProvider;

#[async_trait]
impl ChatProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _messages: &[ChatMessage]) -> Result<ChatResponse> {
        bail!("Chat provider is disabled. Set [chat] provider in the config file.")
    }
}

pub struct OpenAICompatibleProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    max_retries: u32,
}

impl OpenAICompatibleProvider {
    /// Fails if `chat.model` is unset or the key variable is not in the
    /// environment.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("chat.model required for provider '{}'", config.provider))?;

        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.api_key_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: chat_endpoint(&config.base_url),
            api_key,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAICompatibleProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatResponse> {
        let body = self.request_body(messages);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return Ok(parse_chat_response(&json, &self.model));
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let message = api_error_message(&body_text);

                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("Chat API error {}: {}", status, message));
                        continue;
                    }

                    bail!("Chat API error {}: {}", status, message);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Chat request failed after retries")))
    }
}

/// `{base_url}/chat/completions`, tolerating a trailing slash.
pub fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Extract `choices[0].message.content` and `usage`. A missing content is an
/// empty string; a missing `usage` leaves `tokens` unset.
pub fn parse_chat_response(json: &serde_json::Value, requested_model: &str) -> ChatResponse {
    let content = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    let model = json
        .get("model")
        .and_then(|m| m.as_str())
        .unwrap_or(requested_model)
        .to_string();

    let tokens = json.get("usage").map(|usage| {
        let field = |name: &str| usage.get(name).and_then(|v| v.as_u64()).unwrap_or(0);
        TokenUsage {
            prompt: field("prompt_tokens"),
            completion: field("completion_tokens"),
            total: field("total_tokens"),
        }
    });

    ChatResponse {
        content,
        model,
        tokens,
    }
}

/// `error.message` from an error body, or the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

pub fn create_provider(config: &ChatConfig) -> Result<Box<dyn ChatProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAICompatibleProvider::new(config)?)),
        other => bail!("Unknown chat provider: {}", other),
    }
}

/// CLI entry point for `poemdb ask`.
pub async fn run_ask(config: &Config, prompt: &str, system: Option<&str>) -> Result<ChatResponse> {
    let provider = create_provider(&config.chat)?;

    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(prompt));

    let response = provider.complete(&messages).await?;

    println!("{}", response.content);
    if let Some(tokens) = response.tokens {
        eprintln!(
            "[{}] tokens: prompt {}, completion {}, total {}",
            response.model, tokens.prompt, tokens.completion, tokens.total
        );
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_serialize_with_lowercase_roles() {
        let json = serde_json::to_value(ChatMessage::system("你是诗词助手")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "你是诗词助手");
    }

    #[test]
    fn response_content_and_usage_are_extracted() {
        let json = serde_json::json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": "床前明月光"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        });
        let response = parse_chat_response(&json, "requested");
        assert_eq!(response.content, "床前明月光");
        assert_eq!(response.model, "gpt-4o-mini");
        assert_eq!(
            response.tokens,
            Some(TokenUsage {
                prompt: 12,
                completion: 5,
                total: 17
            })
        );
    }

    #[test]
    fn missing_choices_give_empty_content() {
        let response = parse_chat_response(&serde_json::json!({}), "m");
        assert_eq!(response.content, "");
        assert_eq!(response.model, "m");
        assert!(response.tokens.is_none());
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(
            chat_endpoint("https://api.deepseek.com/v1/"),
            "https://api.deepseek.com/v1/chat/completions"
        );
    }

    #[test]
    fn error_body_message_is_preferred() {
        assert_eq!(
            api_error_message(r#"{"error":{"message":"invalid key"}}"#),
            "invalid key"
        );
        assert_eq!(api_error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn openai_provider_requires_key_variable() {
        let config = ChatConfig {
            provider: "openai".to_string(),
            model: Some("gpt-4o-mini".to_string()),
            api_key_env: "POEMDB_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..ChatConfig::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("POEMDB_TEST_KEY_THAT_IS_NOT_SET"));
    }

    #[tokio::test]
    async fn disabled_provider_always_fails() {
        let provider = create_provider(&ChatConfig::default()).unwrap();
        assert_eq!(provider.name(), "disabled");
        assert!(provider.complete(&[ChatMessage::user("hi")]).await.is_err());
    }
}
