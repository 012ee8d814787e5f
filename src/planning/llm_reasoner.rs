//! LLM-backed reasoning source
//!
//! Describes the tool catalog and the plan format to the model, sends the
//! perceived turn plus the user profile, and parses the JSON it returns.
//! The result is still a raw plan; nothing here trusts the model's output.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::llm::{self, LlmClient, Message};

use super::context::PlanningContext;
use super::planner::ReasoningSource;
use super::types::{RawPlan, ReasoningKind};

const PLANNING_PROMPT: &str = r#"You are the decision-making module of a shopping mall assistant. Break the visitor's request into reasoning steps and tool calls. Never execute anything yourself.

Tag every reasoning step with exactly one of these kinds:
- GOAL_DECOMPOSITION: split the request into separate tasks
- CONSTRAINT_ANALYSIS: state each time, budget, accessibility, floor or dietary constraint and where it came from (explicit or inferred from the profile/history)
- SEARCH_STRATEGY: which tool serves which task and with which filters
- ROUTE_OPTIMIZATION: order of visits when there is more than one stop
- VERIFICATION: which constraints the planned filters already satisfy and which must be checked against tool results
- FALLBACK_PLANNING: what to ask when information is missing or ambiguous

Rules:
- Only call tools listed below, with only their declared arguments, and supply every required argument.
- Number tool calls with sequence_index 0, 1, 2, ... in execution order.
- Either call tools, or give a terminal_answer with no tool calls. If you give an answer together with tool calls, set answer_provisional to true.
- If something required is missing, add a FALLBACK_PLANNING step and ask for it in terminal_answer instead of guessing.

Respond with ONLY valid JSON in this format:
{
  "reasoning_steps": [
    {"kind": "GOAL_DECOMPOSITION", "description": "...", "confidence": 0.9}
  ],
  "tool_calls": [
    {"tool_name": "search_shops", "arguments": {"category": "Food"}, "sequence_index": 0, "rationale": "..."}
  ],
  "terminal_answer": null,
  "answer_provisional": false
}"#;

pub struct LlmReasoner {
    client: Arc<dyn LlmClient>,
}

impl LlmReasoner {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    fn system_prompt(ctx: &PlanningContext) -> String {
        let mut prompt = String::from(PLANNING_PROMPT);
        prompt.push_str("\n\nAvailable tools:\n");
        for tool in &ctx.tools {
            let _ = writeln!(
                prompt,
                "- {} [{}]: {}",
                tool.name,
                tool.schema.capabilities.join(", "),
                tool.description
            );
            for field in &tool.schema.required {
                let _ = writeln!(prompt, "    {} ({}, required): {}", field.name, field.ty, field.description);
            }
            for field in &tool.schema.optional {
                let _ = writeln!(prompt, "    {} ({}, optional): {}", field.name, field.ty, field.description);
            }
        }
        prompt
    }

    fn user_message(ctx: &PlanningContext) -> String {
        let perception = &ctx.perception;
        let prefs = &ctx.preferences;
        let mut message = String::new();

        let _ = writeln!(message, "Visitor request: {}", perception.query);
        let _ = writeln!(message, "Primary goal: {}", perception.primary_goal);
        if !perception.sub_goals.is_empty() {
            let _ = writeln!(message, "Sub-goals: {}", perception.sub_goals.join("; "));
        }
        if !perception.entities.is_empty() {
            let entities: Vec<String> = perception
                .entities
                .iter()
                .map(|e| format!("{}={}", e.kind, e.value))
                .collect();
            let _ = writeln!(message, "Entities: {}", entities.join(", "));
        }
        let constraints = serde_json::to_string(&perception.constraints).unwrap_or_default();
        let _ = writeln!(message, "Explicit constraints: {}", constraints);
        let _ = writeln!(message, "Perception confidence: {:.2}", perception.confidence);

        message.push_str("\nUser profile:\n");
        let _ = writeln!(message, "- Shopping style: {}", prefs.shopping_style);
        if let Some(budget) = prefs.budget_preference {
            let _ = writeln!(message, "- Budget: {}", budget);
        }
        if !prefs.preferred_categories.is_empty() {
            let _ = writeln!(message, "- Preferred categories: {}", prefs.preferred_categories.join(", "));
        }
        if !prefs.dietary_restrictions.is_empty() {
            let _ = writeln!(message, "- Dietary restrictions: {}", prefs.dietary_restrictions.join(", "));
        }
        if let Some(needs) = &prefs.accessibility_needs {
            let _ = writeln!(message, "- Accessibility needs: {}", needs);
        }

        if !prefs.history.is_empty() {
            message.push_str("\nRecent conversation:\n");
            for turn in &prefs.history {
                let _ = writeln!(message, "{}: {}", turn.role.as_str(), turn.content);
            }
        }

        if !ctx.repair_notes.is_empty() {
            message.push_str("\nYour previous plan for this request was rejected:\n");
            for note in &ctx.repair_notes {
                let _ = writeln!(message, "- {}", note);
            }
        }
        message
    }
}

#[async_trait]
impl ReasoningSource for LlmReasoner {
    fn name(&self) -> &str {
        "llm"
    }

    async fn decompose(&self, ctx: &PlanningContext) -> Result<RawPlan> {
        let system = Self::system_prompt(ctx);
        let messages = vec![Message::user(Self::user_message(ctx))];

        let response = self
            .client
            .send_message_with_system(&messages, Some(&system))
            .await?;

        let plan = parse_plan_json(response.text())?;
        if plan.reasoning_steps.is_empty() {
            tracing::debug!("Model returned a plan without reasoning steps");
        }
        let unknown_kinds = plan
            .reasoning_steps
            .iter()
            .filter(|s| ReasoningKind::parse(&s.kind).is_none())
            .count();
        if unknown_kinds > 0 {
            tracing::warn!("Model used {} unknown reasoning kind(s)", unknown_kinds);
        }
        Ok(plan)
    }
}

/// Parse JSON from an LLM response, handling markdown fences and leading prose
pub fn parse_plan_json(text: &str) -> Result<RawPlan> {
    serde_json::from_str(llm::extract_json(text)).map_err(|e| {
        let preview: String = text.trim().chars().take(200).collect();
        anyhow::anyhow!("Failed to parse plan JSON: {}. Response was: {}", e, preview)
    })
}
