//! Structural validation of raw plans
//!
//! The validator is the only way to obtain a [`DecisionPlan`]. It checks, in
//! order: reasoning step kinds, the either/or answer rule, tool names,
//! argument coverage and types, and call sequencing.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::tools::ToolCatalog;

use super::error::ValidationError;
use super::planner::new_plan_id;
use super::types::{
    Arguments, DecisionPlan, RawPlan, RawToolCall, ReasoningKind, ReasoningStep, TerminalAnswer,
    ToolCall,
};

pub struct PlanValidator {
    catalog: Arc<ToolCatalog>,
}

impl PlanValidator {
    pub fn new(catalog: Arc<ToolCatalog>) -> Self {
        Self { catalog }
    }

    pub fn validate(&self, raw: &RawPlan) -> Result<DecisionPlan, ValidationError> {
        let steps = check_steps(raw)?;
        let answer = check_answer(raw)?;

        for (index, call) in raw.tool_calls.iter().enumerate() {
            if !self.catalog.contains(&call.tool_name) {
                return Err(ValidationError::UnknownTool {
                    call_index: index,
                    tool_name: call.tool_name.clone(),
                });
            }
        }

        let mut typed = Vec::with_capacity(raw.tool_calls.len());
        for (index, call) in raw.tool_calls.iter().enumerate() {
            typed.push(self.check_arguments(index, call)?);
        }

        let order = check_sequencing(&raw.tool_calls)?;
        let mut calls: Vec<ToolCall> = raw
            .tool_calls
            .iter()
            .zip(typed)
            .zip(order)
            .map(|((call, arguments), sequence_index)| {
                ToolCall::new(
                    call.tool_name.clone(),
                    arguments,
                    sequence_index,
                    call.rationale.clone(),
                )
            })
            .collect();
        calls.sort_by_key(ToolCall::sequence_index);

        let id = raw
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(new_plan_id);

        Ok(DecisionPlan::new(id, steps, calls, answer))
    }

    fn check_arguments(&self, index: usize, call: &RawToolCall) -> Result<Arguments, ValidationError> {
        let schema = self
            .catalog
            .schema(&call.tool_name)
            .ok_or_else(|| ValidationError::UnknownTool {
                call_index: index,
                tool_name: call.tool_name.clone(),
            })?;

        // null stands for "not given"
        let given = |name: &str| call.arguments.get(name).filter(|v| !v.is_null());

        for field in &schema.required {
            if given(field.name).is_none() {
                return Err(ValidationError::MissingArgument {
                    call_index: index,
                    tool_name: call.tool_name.clone(),
                    argument: field.name.to_string(),
                });
            }
        }

        let mut arguments = Arguments::new();
        for (name, value) in &call.arguments {
            let Some((field, _)) = schema.field(name) else {
                return Err(ValidationError::UnknownArgument {
                    call_index: index,
                    tool_name: call.tool_name.clone(),
                    argument: name.clone(),
                });
            };
            if value.is_null() {
                continue;
            }
            let typed = field.ty.coerce(value).ok_or_else(|| ValidationError::TypeMismatch {
                call_index: index,
                tool_name: call.tool_name.clone(),
                argument: name.clone(),
                expected: field.ty.to_string(),
            })?;
            arguments.insert(name.clone(), typed);
        }
        Ok(arguments)
    }
}

fn check_steps(raw: &RawPlan) -> Result<Vec<ReasoningStep>, ValidationError> {
    if raw.reasoning_steps.is_empty() {
        return Err(ValidationError::EmptyReasoning);
    }
    raw.reasoning_steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let kind = ReasoningKind::parse(&step.kind).ok_or_else(|| {
                ValidationError::InvalidStepKind {
                    step_index: index,
                    kind: step.kind.clone(),
                }
            })?;
            let confidence = if step.confidence.is_nan() {
                0.0
            } else {
                step.confidence.clamp(0.0, 1.0)
            };
            Ok(ReasoningStep::new(kind, step.description.clone(), confidence))
        })
        .collect()
}

fn check_answer(raw: &RawPlan) -> Result<Option<TerminalAnswer>, ValidationError> {
    let answer = raw
        .terminal_answer
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| TerminalAnswer {
            text: text.to_string(),
            provisional: raw.answer_provisional,
        });

    match (&answer, raw.tool_calls.is_empty()) {
        // A provisional answer with nothing to confirm it is no answer at all
        (None, true) => Err(ValidationError::EmptyPlan),
        (Some(a), true) if a.provisional => Err(ValidationError::EmptyPlan),
        (Some(a), false) if !a.provisional => Err(ValidationError::ConflictingAnswer),
        _ => Ok(answer),
    }
}

/// Sequence index of every call, in input order
fn check_sequencing(calls: &[RawToolCall]) -> Result<Vec<usize>, ValidationError> {
    let mut seen = BTreeSet::new();
    let mut order = Vec::with_capacity(calls.len());
    for (index, call) in calls.iter().enumerate() {
        let bad = |detail: String| ValidationError::BadSequencing {
            call_index: index,
            detail,
        };
        let value = call
            .sequence_index
            .ok_or_else(|| bad("missing sequence_index".to_string()))?;
        let value = usize::try_from(value)
            .map_err(|_| bad(format!("negative sequence_index {}", value)))?;
        if value >= calls.len() {
            return Err(bad(format!(
                "sequence_index {} leaves a gap, expected 0..{}",
                value,
                calls.len()
            )));
        }
        if !seen.insert(value) {
            return Err(bad(format!("duplicate sequence_index {}", value)));
        }
        order.push(value);
    }
    Ok(order)
}
