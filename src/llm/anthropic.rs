use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{LlmClient, LlmResponse, Message, Role, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

pub struct AnthropicClient {
    api_key: String,
    model: String,
    max_tokens: usize,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: usize,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: usize,
    output_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String, max_tokens: usize, base_url: Option<String>) -> Self {
        Self {
            api_key,
            model,
            max_tokens,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            client: reqwest::Client::new(),
        }
    }

    fn convert_message_to_anthropic(msg: &Message) -> AnthropicMessage {
        AnthropicMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn send_message_with_system(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
    ) -> Result<LlmResponse> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: messages
                .iter()
                .map(Self::convert_message_to_anthropic)
                .collect(),
            system: system_prompt.map(str::to_string),
        };

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Anthropic")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            anyhow::bail!("Anthropic API error ({}): {}", status, text);
        }

        let anthropic_response: AnthropicResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic response")?;

        let text = anthropic_response
            .content
            .into_iter()
            .filter_map(|c| match c {
                AnthropicContent::Text { text } => Some(text),
                AnthropicContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(LlmResponse {
            message: Message {
                role: Role::Assistant,
                content: text,
            },
            usage: anthropic_response.usage.map(|u| TokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }
}
