use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{LlmClient, LlmResponse, Message, Role, TokenUsage};

pub struct OllamaClient {
    base_url: String,
    model: String,
    max_tokens: usize,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    choices: Vec<OllamaChoice>,
    #[serde(default)]
    usage: Option<OllamaUsage>,
}

#[derive(Debug, Deserialize)]
struct OllamaChoice {
    message: OllamaResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, model: String, max_tokens: usize) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".to_string()),
            model,
            max_tokens,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn send_message_with_system(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
    ) -> Result<LlmResponse> {
        // Build messages, prepending system prompt if provided
        let mut ollama_messages = Vec::new();

        if let Some(system) = system_prompt {
            ollama_messages.push(OllamaMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }

        ollama_messages.extend(messages.iter().map(|msg| OllamaMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }));

        let request = OllamaRequest {
            model: self.model.clone(),
            messages: ollama_messages,
            max_tokens: Some(self.max_tokens),
        };

        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            anyhow::bail!("Ollama API error ({}): {}", status, error_text);
        }

        let ollama_response: OllamaResponse = response.json().await?;
        let content = ollama_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(LlmResponse {
            message: Message {
                role: Role::Assistant,
                content,
            },
            usage: ollama_response
                .usage
                .map(|u| TokenUsage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                }),
        })
    }
}
