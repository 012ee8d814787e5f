//! Decision planner
//!
//! Checks the perceived input, short-circuits low-confidence turns into a
//! clarifying question, and otherwise asks the configured reasoning source
//! for a raw plan under a timeout.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::PlannerConfig;
use crate::memory::PreferenceContext;
use crate::perception::PerceptionSummary;
use crate::tools::ToolCatalog;

use super::context::PlanningContext;
use super::error::PlanningError;
use super::types::{RawPlan, ReasoningKind};

/// Something that can decompose a turn into a raw plan
#[async_trait]
pub trait ReasoningSource: Send + Sync {
    fn name(&self) -> &str;
    async fn decompose(&self, ctx: &PlanningContext) -> anyhow::Result<RawPlan>;
}

pub(crate) fn new_plan_id() -> String {
    format!("plan-{}", &Uuid::new_v4().to_string()[..8])
}

pub struct DecisionPlanner {
    source: Arc<dyn ReasoningSource>,
    catalog: Arc<ToolCatalog>,
    min_confidence: f64,
    timeout: Duration,
}

impl DecisionPlanner {
    pub fn new(
        source: Arc<dyn ReasoningSource>,
        catalog: Arc<ToolCatalog>,
        config: &PlannerConfig,
    ) -> Self {
        Self {
            source,
            catalog,
            min_confidence: config.min_confidence_threshold,
            timeout: config.reasoning_source_timeout(),
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Produce a raw plan for one turn. Never executes tools.
    pub async fn plan(
        &self,
        perception: Option<&PerceptionSummary>,
        preferences: &PreferenceContext,
        repair_notes: &[String],
    ) -> Result<RawPlan, PlanningError> {
        let perception = check_input(perception)?;

        if perception.confidence < self.min_confidence {
            tracing::info!(
                "Perception confidence {:.2} below threshold {:.2}, asking for clarification",
                perception.confidence,
                self.min_confidence
            );
            return Ok(self.clarification_plan(perception));
        }

        let ctx = PlanningContext {
            perception: perception.clone(),
            preferences: preferences.clone(),
            tools: self.catalog.descriptors(),
            repair_notes: repair_notes.to_vec(),
            min_confidence: self.min_confidence,
        };

        tracing::debug!(
            "Decomposing '{}' with the {} source",
            perception.primary_goal,
            self.source.name()
        );
        let mut raw = match tokio::time::timeout(self.timeout, self.source.decompose(&ctx)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                return Err(PlanningError::PlannerUnavailable(format!(
                    "{} source failed: {:#}",
                    self.source.name(),
                    e
                )))
            }
            Err(_) => {
                return Err(PlanningError::PlannerUnavailable(format!(
                    "{} source timed out after {:?}",
                    self.source.name(),
                    self.timeout
                )))
            }
        };

        if raw.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            raw.id = Some(new_plan_id());
        }
        tracing::info!(
            "Planned {} reasoning step(s) and {} tool call(s)",
            raw.reasoning_steps.len(),
            raw.tool_calls.len()
        );
        Ok(raw)
    }

    /// Deterministic plan for a turn we did not understand well enough
    fn clarification_plan(&self, perception: &PerceptionSummary) -> RawPlan {
        let mut plan = RawPlan {
            id: Some(new_plan_id()),
            ..RawPlan::default()
        };
        plan.push_step(
            ReasoningKind::GoalDecomposition,
            format!("Understood goal (uncertain): {}", perception.primary_goal),
            perception.confidence,
        );
        plan.push_step(
            ReasoningKind::FallbackPlanning,
            format!(
                "Perception confidence {:.2} is below the {:.2} threshold; asking a clarifying question instead of calling tools",
                perception.confidence, self.min_confidence
            ),
            1.0,
        );
        plan.terminal_answer = Some(
            "I'm not sure I understood. Could you tell me what you're looking for, such as a shop, something to eat, or a facility?"
                .to_string(),
        );
        plan
    }
}

fn check_input(perception: Option<&PerceptionSummary>) -> Result<&PerceptionSummary, PlanningError> {
    let perception = perception
        .ok_or_else(|| PlanningError::MalformedInput("no perception summary".to_string()))?;

    if perception.primary_goal.trim().is_empty() {
        return Err(PlanningError::MalformedInput("primary goal is empty".to_string()));
    }
    if !(0.0..=1.0).contains(&perception.confidence) {
        return Err(PlanningError::MalformedInput(format!(
            "confidence {} is outside [0, 1]",
            perception.confidence
        )));
    }
    if let Some(floor) = perception
        .constraints
        .floor_restriction
        .iter()
        .flatten()
        .find(|f| **f < 0)
    {
        return Err(PlanningError::MalformedInput(format!(
            "floor restriction contains negative floor {}",
            floor
        )));
    }
    Ok(perception)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::Constraints;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReasoningSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        async fn decompose(&self, _ctx: &PlanningContext) -> anyhow::Result<RawPlan> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut plan = RawPlan::default();
            plan.push_step(ReasoningKind::GoalDecomposition, "Thread 1", 1.0);
            plan.terminal_answer = Some("done".to_string());
            Ok(plan)
        }
    }

    struct SlowSource;

    #[async_trait]
    impl ReasoningSource for SlowSource {
        fn name(&self) -> &str {
            "slow"
        }

        async fn decompose(&self, _ctx: &PlanningContext) -> anyhow::Result<RawPlan> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(RawPlan::default())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ReasoningSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn decompose(&self, _ctx: &PlanningContext) -> anyhow::Result<RawPlan> {
            anyhow::bail!("connection refused")
        }
    }

    fn perception(confidence: f64) -> PerceptionSummary {
        PerceptionSummary {
            primary_goal: "lunch".to_string(),
            sub_goals: vec![],
            entities: vec![],
            constraints: Constraints::default(),
            confidence,
            query: "lunch".to_string(),
        }
    }

    fn planner(source: Arc<dyn ReasoningSource>) -> DecisionPlanner {
        let config = PlannerConfig {
            reasoning_source_timeout_secs: 1,
            ..PlannerConfig::default()
        };
        DecisionPlanner::new(source, Arc::new(ToolCatalog::new()), &config)
    }

    #[tokio::test]
    async fn test_missing_perception_is_malformed() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let result = planner(source.clone())
            .plan(None, &PreferenceContext::default(), &[])
            .await;
        assert!(matches!(result, Err(PlanningError::MalformedInput(_))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_inputs_are_malformed() {
        let planner = planner(Arc::new(FailingSource));
        let prefs = PreferenceContext::default();

        let nan = perception(f64::NAN);
        assert!(matches!(
            planner.plan(Some(&nan), &prefs, &[]).await,
            Err(PlanningError::MalformedInput(_))
        ));

        let mut blank = perception(0.9);
        blank.primary_goal = "  ".to_string();
        assert!(matches!(
            planner.plan(Some(&blank), &prefs, &[]).await,
            Err(PlanningError::MalformedInput(_))
        ));

        let mut basement = perception(0.9);
        basement.constraints.floor_restriction = Some([-1].into_iter().collect());
        assert!(matches!(
            planner.plan(Some(&basement), &prefs, &[]).await,
            Err(PlanningError::MalformedInput(_))
        ));
    }

    #[tokio::test]
    async fn test_low_confidence_skips_source() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let raw = planner(source.clone())
            .plan(Some(&perception(0.2)), &PreferenceContext::default(), &[])
            .await
            .unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(raw.has_step(ReasoningKind::FallbackPlanning));
        assert!(raw.tool_calls.is_empty());
        assert!(raw.terminal_answer.is_some());
    }

    #[tokio::test]
    async fn test_source_plan_gets_an_id() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let raw = planner(source.clone())
            .plan(Some(&perception(0.9)), &PreferenceContext::default(), &[])
            .await
            .unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(raw.id.unwrap().starts_with("plan-"));
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let result = planner(Arc::new(SlowSource))
            .plan(Some(&perception(0.9)), &PreferenceContext::default(), &[])
            .await;
        match result {
            Err(PlanningError::PlannerUnavailable(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected PlannerUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_source_error_is_unavailable() {
        let result = planner(Arc::new(FailingSource))
            .plan(Some(&perception(0.9)), &PreferenceContext::default(), &[])
            .await;
        match result {
            Err(PlanningError::PlannerUnavailable(msg)) => {
                assert!(msg.contains("connection refused"))
            }
            other => panic!("expected PlannerUnavailable, got {:?}", other),
        }
    }
}
