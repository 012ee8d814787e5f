//! One assistant session: perception, planning, validation, execution
//!
//! A turn goes through the perceiver, the decision planner and the
//! plan validator. Validated calls run on the executor and the results are
//! composed into a reply. Planning failures never escape a turn; each maps
//! to a clarifying or apologetic reply.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::{Config, PlannerConfig, ReasoningMode};
use crate::llm::{self, LlmClient, Role};
use crate::mall::MallDirectory;
use crate::memory::{ConversationMemory, PreferenceContext, UserPreferences};
use crate::perception::{KeywordPerceiver, LlmPerceiver, Perceiver, PerceptionSummary};
use crate::planning::{
    DecisionPlan, DecisionPlanner, ExecutionReport, LlmReasoner, PlanEvent, PlanExecutor,
    PlanValidator, PlanningError, ReasoningSource, RuleBasedReasoner,
};
use crate::tools::ToolCatalog;

mod response;

pub use response::ResponseComposer;

const CLARIFY_REPLY: &str =
    "Could you tell me what you're looking for? For example a shop, somewhere to eat, or a facility.";
const UNAVAILABLE_REPLY: &str =
    "I'm having trouble working that out right now. Could you rephrase or try again in a moment?";
const INVALID_PLAN_REPLY: &str = "Sorry, I could not complete the request.";

/// Build an agent for the configured mall and reasoning mode
///
/// In LLM mode perception and planning share one client, so its rate
/// limit covers both.
pub fn build_agent(config: &Config) -> Result<MallAgent> {
    let mall = Arc::new(load_mall(config)?);
    let agent = match config.planner.reasoning {
        ReasoningMode::Rules => {
            MallAgent::new(&config.planner, Arc::new(RuleBasedReasoner::new()), mall)
        }
        ReasoningMode::Llm => {
            let client: Arc<dyn LlmClient> = Arc::from(llm::create_client(config)?);
            let perceiver = LlmPerceiver::new(client.clone(), KeywordPerceiver::for_mall(&mall));
            MallAgent::new(&config.planner, Arc::new(LlmReasoner::new(client)), mall)
                .with_perceiver(Box::new(perceiver))
        }
    };
    Ok(agent)
}

/// The configured mall directory, or the built-in one
pub fn load_mall(config: &Config) -> Result<MallDirectory> {
    match &config.mall.data_path {
        Some(path) => MallDirectory::load(path)
            .with_context(|| format!("Failed to load mall data from {}", path.display())),
        None => MallDirectory::builtin(),
    }
}

/// Everything that happened in one turn
#[derive(Debug)]
pub struct TurnOutcome {
    pub perception: Option<PerceptionSummary>,
    pub plan: Option<DecisionPlan>,
    pub report: Option<ExecutionReport>,
    pub reply: String,
}

pub struct MallAgent {
    perceiver: Box<dyn Perceiver>,
    memory: ConversationMemory,
    planner: DecisionPlanner,
    validator: PlanValidator,
    executor: PlanExecutor,
    config: PlannerConfig,
}

impl MallAgent {
    pub fn new(config: &PlannerConfig, source: Arc<dyn ReasoningSource>, mall: Arc<MallDirectory>) -> Self {
        let catalog = Arc::new(ToolCatalog::new());
        Self {
            perceiver: Box::new(KeywordPerceiver::for_mall(&mall)),
            memory: ConversationMemory::with_capacity(config.history_capacity()),
            planner: DecisionPlanner::new(source, catalog.clone(), config),
            validator: PlanValidator::new(catalog.clone()),
            executor: PlanExecutor::new(catalog, mall),
            config: config.clone(),
        }
    }

    pub fn with_perceiver(mut self, perceiver: Box<dyn Perceiver>) -> Self {
        self.perceiver = perceiver;
        self
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<PlanEvent>) -> Self {
        self.executor = self.executor.with_events(tx);
        self
    }

    pub fn set_preferences(&mut self, preferences: UserPreferences) {
        self.memory.set_preferences(preferences);
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn source_name(&self) -> &str {
        self.planner.source_name()
    }

    /// Perceive, plan and validate without executing anything
    pub async fn plan_only(&self, utterance: &str) -> Result<DecisionPlan, PlanningError> {
        let perception = self.perceiver.perceive(utterance).await;
        let preferences = self.memory.snapshot(self.config.history_window);
        self.decide(perception.as_ref(), &preferences).await
    }

    pub async fn handle_turn(&mut self, utterance: &str) -> TurnOutcome {
        let perception = self.perceiver.perceive(utterance).await;
        let preferences = self.memory.snapshot(self.config.history_window);

        let (plan, report, reply) = match self.decide(perception.as_ref(), &preferences).await {
            Ok(plan) => {
                let report = if plan.tool_calls().is_empty() {
                    None
                } else {
                    Some(self.executor.execute(&plan).await)
                };
                let reply = ResponseComposer::compose(&plan, report.as_ref());
                (Some(plan), report, reply)
            }
            Err(e) => {
                tracing::warn!("Turn could not be planned: {}", e);
                let reply = match e {
                    PlanningError::MalformedInput(_) => CLARIFY_REPLY,
                    PlanningError::PlannerUnavailable(_) => UNAVAILABLE_REPLY,
                    PlanningError::Validation(_) => INVALID_PLAN_REPLY,
                };
                (None, None, reply.to_string())
            }
        };

        self.memory.add_message(Role::User, utterance);
        self.memory.add_message(Role::Assistant, reply.clone());

        TurnOutcome {
            perception,
            plan,
            report,
            reply,
        }
    }

    /// Plan with one retry for an unavailable source and one repair round
    /// for a plan that fails validation
    async fn decide(
        &self,
        perception: Option<&PerceptionSummary>,
        preferences: &PreferenceContext,
    ) -> Result<DecisionPlan, PlanningError> {
        let mut repair_notes: Vec<String> = Vec::new();
        let mut retried = false;

        loop {
            let raw = match self.planner.plan(perception, preferences, &repair_notes).await {
                Ok(raw) => raw,
                Err(PlanningError::PlannerUnavailable(msg)) if !retried => {
                    tracing::warn!("Reasoning source unavailable, retrying once: {}", msg);
                    retried = true;
                    tokio::time::sleep(self.config.retry_backoff()).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match self.validator.validate(&raw) {
                Ok(plan) => return Ok(plan),
                Err(e) if repair_notes.is_empty() => {
                    tracing::warn!("Plan rejected, re-planning: {}", e);
                    repair_notes.push(e.repair_note());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::{PlanningContext, RawPlan, RawToolCall, ReasoningKind};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mall() -> Arc<MallDirectory> {
        Arc::new(MallDirectory::builtin().unwrap())
    }

    fn fast_config() -> PlannerConfig {
        PlannerConfig {
            retry_backoff_ms: 10,
            ..PlannerConfig::default()
        }
    }

    /// Proposes an unknown tool until it sees a repair note
    struct RepairingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReasoningSource for RepairingSource {
        fn name(&self) -> &str {
            "repairing"
        }

        async fn decompose(&self, ctx: &PlanningContext) -> anyhow::Result<RawPlan> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut plan = RawPlan::default();
            plan.push_step(ReasoningKind::SearchStrategy, "look up events", 1.0);
            let tool = if ctx.repair_notes.is_empty() {
                "teleport"
            } else {
                "get_current_events"
            };
            plan.tool_calls.push(RawToolCall {
                tool_name: tool.to_string(),
                arguments: BTreeMap::new(),
                sequence_index: Some(0),
                rationale: String::new(),
            });
            Ok(plan)
        }
    }

    struct BrokenSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReasoningSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }

        async fn decompose(&self, _ctx: &PlanningContext) -> anyhow::Result<RawPlan> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("model overloaded")
        }
    }

    #[tokio::test]
    async fn test_rules_agent_answers_dining_request() {
        let mut agent = MallAgent::new(&fast_config(), Arc::new(RuleBasedReasoner::new()), mall());
        let outcome = agent.handle_turn("I want vegan food for lunch").await;
        let plan = outcome.plan.unwrap();
        assert_eq!(plan.tool_calls()[0].tool_name(), "search_shops");
        assert!(outcome.reply.contains("Green Bowl"));
        assert_eq!(agent.memory().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_input_gets_clarifying_reply() {
        let mut agent = MallAgent::new(&fast_config(), Arc::new(RuleBasedReasoner::new()), mall());
        let outcome = agent.handle_turn("   ").await;
        assert!(outcome.plan.is_none());
        assert_eq!(outcome.reply, CLARIFY_REPLY);
    }

    #[tokio::test]
    async fn test_invalid_plan_is_repaired_once() {
        let source = Arc::new(RepairingSource {
            calls: AtomicUsize::new(0),
        });
        let mut agent = MallAgent::new(&fast_config(), source.clone(), mall());
        let outcome = agent.handle_turn("what events are on today").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(outcome.reply.contains("Holiday Shopping Festival"));
    }

    #[tokio::test]
    async fn test_history_is_bounded_by_config() {
        let config = PlannerConfig {
            history_window: 1,
            ..fast_config()
        };
        let mut agent = MallAgent::new(&config, Arc::new(RuleBasedReasoner::new()), mall());
        for _ in 0..5 {
            agent.handle_turn("where can I get coffee").await;
        }
        assert_eq!(agent.memory().len(), config.history_capacity());
    }

    #[test]
    fn test_llm_mode_builds_llm_agent() {
        let mut config = Config::default();
        config.llm.provider = crate::config::LlmProvider::Ollama;
        config.llm.base_url = Some("http://127.0.0.1:9".to_string());
        config.planner.reasoning = ReasoningMode::Llm;
        assert_eq!(build_agent(&config).unwrap().source_name(), "llm");

        config.planner.reasoning = ReasoningMode::Rules;
        assert_eq!(build_agent(&config).unwrap().source_name(), "rules");
    }

    #[tokio::test]
    async fn test_unavailable_source_is_retried_once() {
        let source = Arc::new(BrokenSource {
            calls: AtomicUsize::new(0),
        });
        let mut agent = MallAgent::new(&fast_config(), source.clone(), mall());
        let outcome = agent.handle_turn("where can I get coffee").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.reply, UNAVAILABLE_REPLY);
    }
}
