//! Plan executor
//!
//! Runs the tool calls of a validated plan in sequence order. A failing
//! call is recorded and execution moves on to the next one.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::mall::MallDirectory;
use crate::tools::{ToolCatalog, ToolContext};

use super::types::{DecisionPlan, ToolCall};

/// Progress events emitted while a plan runs
#[derive(Debug, Clone)]
pub enum PlanEvent {
    CallStarted {
        plan_id: String,
        sequence_index: usize,
        tool_name: String,
    },
    CallCompleted {
        plan_id: String,
        sequence_index: usize,
        success: bool,
        output: Option<String>,
        error: Option<String>,
    },
    PlanCompleted {
        plan_id: String,
        success: bool,
        summary: String,
    },
}

/// Result of one tool call
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutcome {
    pub tool_name: String,
    pub sequence_index: usize,
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub plan_id: String,
    pub outcomes: Vec<ToolOutcome>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ToolOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    pub fn summary(&self) -> String {
        let failed = self.failures().count();
        format!(
            "{}/{} tool calls succeeded",
            self.outcomes.len() - failed,
            self.outcomes.len()
        )
    }
}

pub struct PlanExecutor {
    catalog: Arc<ToolCatalog>,
    mall: Arc<MallDirectory>,
    event_tx: Option<mpsc::UnboundedSender<PlanEvent>>,
}

impl PlanExecutor {
    pub fn new(catalog: Arc<ToolCatalog>, mall: Arc<MallDirectory>) -> Self {
        Self {
            catalog,
            mall,
            event_tx: None,
        }
    }

    /// Send progress events to `tx` while executing
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<PlanEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn emit(&self, event: PlanEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    pub async fn execute(&self, plan: &DecisionPlan) -> ExecutionReport {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(plan.tool_calls().len());

        for call in plan.tool_calls() {
            self.emit(PlanEvent::CallStarted {
                plan_id: plan.id().to_string(),
                sequence_index: call.sequence_index(),
                tool_name: call.tool_name().to_string(),
            });

            let start_time = Instant::now();
            let result = self.run_call(call).await;
            let duration_ms = start_time.elapsed().as_millis() as u64;

            let outcome = match result {
                Ok(output) => ToolOutcome {
                    tool_name: call.tool_name().to_string(),
                    sequence_index: call.sequence_index(),
                    success: true,
                    output: Some(output),
                    error: None,
                    duration_ms,
                },
                Err(e) => {
                    tracing::warn!("Tool {} failed: {:#}", call.tool_name(), e);
                    // Keep going with the remaining calls
                    ToolOutcome {
                        tool_name: call.tool_name().to_string(),
                        sequence_index: call.sequence_index(),
                        success: false,
                        output: None,
                        error: Some(format!("{:#}", e)),
                        duration_ms,
                    }
                }
            };

            self.emit(PlanEvent::CallCompleted {
                plan_id: plan.id().to_string(),
                sequence_index: outcome.sequence_index,
                success: outcome.success,
                output: outcome.output.clone(),
                error: outcome.error.clone(),
            });
            outcomes.push(outcome);
        }

        let report = ExecutionReport {
            plan_id: plan.id().to_string(),
            outcomes,
            started_at,
            completed_at: Utc::now(),
        };

        self.emit(PlanEvent::PlanCompleted {
            plan_id: report.plan_id.clone(),
            success: report.all_succeeded(),
            summary: report.summary(),
        });
        tracing::debug!("Plan {}: {}", report.plan_id, report.summary());

        report
    }

    async fn run_call(&self, call: &ToolCall) -> anyhow::Result<String> {
        let tool = self
            .catalog
            .get_tool(call.tool_name())
            .ok_or_else(|| anyhow::anyhow!("tool '{}' is not registered", call.tool_name()))?;
        let ctx = ToolContext::new(&self.mall);
        tool.execute(call.arguments(), &ctx).await
    }
}
