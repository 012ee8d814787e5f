//! LLM-backed perceiver

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use super::{KeywordPerceiver, Perceiver, PerceptionSummary};
use crate::llm::{self, LlmClient, Message};

const PERCEPTION_PROMPT: &str = r#"You are the perception module of a shopping mall assistant. Read the visitor's message and describe what they want. Do not plan or answer.

- primary_goal: the first thing the visitor wants, in their own words without constraint phrases
- sub_goals: any further things they want, in the order they said them
- entities: kind is one of category, keyword, shop, facility, item, dietary
- constraints: only what the visitor stated in this message
  - time_budget: minutes
  - monetary_budget: "low", "medium" or "high"
  - accessibility: true when they need step-free access
  - floor_restriction: list of floor numbers ("lower floors" means [1, 2])
- confidence: 0.9-1.0 very clear, 0.7-0.9 likely, 0.5-0.7 uncertain, below 0.5 unclear

Respond with ONLY valid JSON in this format:
{
  "primary_goal": "find a gift for my wife",
  "sub_goals": ["lunch"],
  "entities": [{"kind": "keyword", "value": "gift"}, {"kind": "category", "value": "Food"}],
  "constraints": {"time_budget": 120, "monetary_budget": null, "accessibility": null, "floor_restriction": [1, 2]},
  "confidence": 0.9
}"#;

/// Asks the model for a perception summary; keyword tables cover failures
pub struct LlmPerceiver {
    client: Arc<dyn LlmClient>,
    fallback: KeywordPerceiver,
}

impl LlmPerceiver {
    pub fn new(client: Arc<dyn LlmClient>, fallback: KeywordPerceiver) -> Self {
        Self { client, fallback }
    }

    fn system_prompt(&self) -> String {
        let mut prompt = String::from(PERCEPTION_PROMPT);
        if !self.fallback.shop_names().is_empty() {
            prompt.push_str("\n\nShops in this mall: ");
            prompt.push_str(&self.fallback.shop_names().join(", "));
        }
        prompt
    }

    async fn ask_model(&self, query: &str) -> Result<PerceptionSummary> {
        let system = self.system_prompt();
        let response = self
            .client
            .send_message_with_system(&[Message::user(query)], Some(&system))
            .await?;

        let mut summary: PerceptionSummary = serde_json::from_str(llm::extract_json(response.text()))
            .context("Failed to parse perception JSON")?;
        if summary.primary_goal.trim().is_empty() {
            bail!("model returned no primary goal");
        }
        if !(0.0..=1.0).contains(&summary.confidence) {
            bail!("model returned confidence {} outside [0, 1]", summary.confidence);
        }
        summary.query = query.to_string();
        Ok(summary)
    }
}

#[async_trait]
impl Perceiver for LlmPerceiver {
    async fn perceive(&self, utterance: &str) -> Option<PerceptionSummary> {
        let query = utterance.trim();
        if query.is_empty() {
            return None;
        }
        match self.ask_model(query).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!("LLM perception failed, using keyword tables: {}", e);
                self.fallback.summarize(query)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, Role};
    use crate::mall::MallDirectory;
    use std::sync::Mutex;

    struct ScriptedClient {
        reply: Result<String, String>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(vec![]),
            })
        }

        fn failing(error: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(error.to_string()),
                seen: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn send_message_with_system(
            &self,
            _messages: &[Message],
            system_prompt: Option<&str>,
        ) -> Result<LlmResponse> {
            self.seen
                .lock()
                .unwrap()
                .push(system_prompt.unwrap_or_default().to_string());
            match &self.reply {
                Ok(text) => Ok(LlmResponse {
                    message: Message {
                        role: Role::Assistant,
                        content: text.clone(),
                    },
                    usage: None,
                }),
                Err(e) => Err(anyhow::anyhow!(e.clone())),
            }
        }
    }

    fn keywords() -> KeywordPerceiver {
        KeywordPerceiver::for_mall(&MallDirectory::builtin().unwrap())
    }

    #[tokio::test]
    async fn test_model_summary_is_used() {
        let client = ScriptedClient::replying(
            r#"```json
{
  "primary_goal": "new sneakers",
  "sub_goals": ["coffee"],
  "entities": [{"kind": "keyword", "value": "sneakers"}],
  "constraints": {"time_budget": 45, "floor_restriction": [2]},
  "confidence": 0.85
}
```"#,
        );
        let perceiver = LlmPerceiver::new(client.clone(), keywords());
        let summary = perceiver
            .perceive("need sneakers then a coffee, 45 min, floor 2")
            .await
            .unwrap();

        assert_eq!(summary.primary_goal, "new sneakers");
        assert_eq!(summary.sub_goals, vec!["coffee".to_string()]);
        assert_eq!(summary.constraints.time_budget, Some(45));
        assert_eq!(summary.confidence, 0.85);
        assert_eq!(summary.query, "need sneakers then a coffee, 45 min, floor 2");
        assert!(client.seen.lock().unwrap()[0].contains("Green Bowl"));
    }

    #[tokio::test]
    async fn test_transport_error_falls_back_to_keywords() {
        let perceiver = LlmPerceiver::new(ScriptedClient::failing("connection refused"), keywords());
        let summary = perceiver.perceive("where is the nearest restroom").await.unwrap();
        assert_eq!(summary.confidence, 0.9);
        assert_eq!(summary.primary_goal, "where is the nearest restroom");
    }

    #[tokio::test]
    async fn test_unusable_reply_falls_back_to_keywords() {
        let perceiver = LlmPerceiver::new(
            ScriptedClient::replying(r#"{"primary_goal": "lunch", "confidence": 7}"#),
            keywords(),
        );
        let summary = perceiver.perceive("lunch please").await.unwrap();
        assert_eq!(summary.confidence, 0.9);

        let perceiver = LlmPerceiver::new(ScriptedClient::replying("I'd love to help!"), keywords());
        assert!(perceiver.perceive("lunch please").await.is_some());
    }

    #[tokio::test]
    async fn test_blank_input_skips_the_model() {
        let client = ScriptedClient::replying("{}");
        let perceiver = LlmPerceiver::new(client.clone(), keywords());
        assert!(perceiver.perceive("  ").await.is_none());
        assert!(client.seen.lock().unwrap().is_empty());
    }
}
