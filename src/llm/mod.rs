use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, LlmProvider};

pub mod anthropic;
pub mod ollama;
pub mod rate_limit;

pub use rate_limit::{RateLimitedClient, RateLimiter};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Token usage information from LLM response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Response from LLM including message and token usage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub message: Message,
    pub usage: Option<TokenUsage>,
}

impl LlmResponse {
    pub fn text(&self) -> &str {
        &self.message.content
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a conversation to the LLM with optional system prompt
    async fn send_message_with_system(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
    ) -> Result<LlmResponse>;

    async fn send_message(&self, messages: &[Message]) -> Result<LlmResponse> {
        self.send_message_with_system(messages, None).await
    }
}

/// Create the provider-specific LLM client, rate limited when configured
pub fn create_client(config: &Config) -> Result<Box<dyn LlmClient>> {
    let client = create_provider_client(config)?;
    match config.llm.max_requests_per_minute {
        0 => Ok(client),
        limit => {
            tracing::debug!("Limiting LLM calls to {} per minute", limit);
            Ok(Box::new(RateLimitedClient::new(client, RateLimiter::per_minute(limit))))
        }
    }
}

fn create_provider_client(config: &Config) -> Result<Box<dyn LlmClient>> {
    match config.llm.provider {
        LlmProvider::Anthropic => {
            let api_key = config
                .get_auth_token()
                .context("Anthropic API key not set. Set ANTHROPIC_API_KEY or configure llm.api_key")?;
            tracing::info!("Using Anthropic model {}", config.llm.model);
            Ok(Box::new(anthropic::AnthropicClient::new(
                api_key,
                config.llm.model.clone(),
                config.llm.max_tokens,
                config.llm.base_url.clone(),
            )))
        }
        LlmProvider::Ollama => {
            tracing::info!("Using Ollama model {}", config.llm.model);
            Ok(Box::new(ollama::OllamaClient::new(
                config.llm.base_url.clone(),
                config.llm.model.clone(),
                config.llm.max_tokens,
            )))
        }
    }
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// The JSON object inside a model reply, tolerating markdown fences and leading prose
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();
    if text.starts_with('{') && text.ends_with('}') {
        return text;
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}
