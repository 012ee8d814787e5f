//! Core types for decision plans
//!
//! A reasoning source produces a [`RawPlan`]: kinds as free strings,
//! arguments as JSON. Only the validator turns it into a [`DecisionPlan`],
//! whose kinds are a closed enum and whose arguments are typed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The six tags a reasoning step may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasoningKind {
    GoalDecomposition,
    ConstraintAnalysis,
    SearchStrategy,
    RouteOptimization,
    Verification,
    FallbackPlanning,
}

impl ReasoningKind {
    pub const ALL: [ReasoningKind; 6] = [
        ReasoningKind::GoalDecomposition,
        ReasoningKind::ConstraintAnalysis,
        ReasoningKind::SearchStrategy,
        ReasoningKind::RouteOptimization,
        ReasoningKind::Verification,
        ReasoningKind::FallbackPlanning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningKind::GoalDecomposition => "GOAL_DECOMPOSITION",
            ReasoningKind::ConstraintAnalysis => "CONSTRAINT_ANALYSIS",
            ReasoningKind::SearchStrategy => "SEARCH_STRATEGY",
            ReasoningKind::RouteOptimization => "ROUTE_OPTIMIZATION",
            ReasoningKind::Verification => "VERIFICATION",
            ReasoningKind::FallbackPlanning => "FALLBACK_PLANNING",
        }
    }

    /// Exact tag match; anything outside the enumeration is `None`
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for ReasoningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tagged unit of the planner's explanation trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    kind: ReasoningKind,
    description: String,
    confidence: f64,
}

impl ReasoningStep {
    pub(crate) fn new(kind: ReasoningKind, description: String, confidence: f64) -> Self {
        Self {
            kind,
            description,
            confidence,
        }
    }

    pub fn kind(&self) -> ReasoningKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

impl fmt::Display for ReasoningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.description)
    }
}

/// A typed tool argument, one variant per declared semantic type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ArgValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    /// Minutes
    Duration(i64),
    Choice(String),
    TextList(Vec<String>),
    IntegerList(Vec<i64>),
}

impl ArgValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ArgValue::Text(s) | ArgValue::Choice(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ArgValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_duration_minutes(&self) -> Option<i64> {
        match self {
            ArgValue::Duration(m) => Some(*m),
            _ => None,
        }
    }

    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            ArgValue::TextList(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_integer_list(&self) -> Option<&[i64]> {
        match self {
            ArgValue::IntegerList(items) => Some(items),
            _ => None,
        }
    }

    /// Plain JSON form, as a reasoning source would have written it
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ArgValue::Text(s) | ArgValue::Choice(s) => serde_json::Value::from(s.as_str()),
            ArgValue::Integer(n) | ArgValue::Duration(n) => serde_json::Value::from(*n),
            ArgValue::Boolean(b) => serde_json::Value::from(*b),
            ArgValue::TextList(items) => serde_json::Value::from(items.clone()),
            ArgValue::IntegerList(items) => serde_json::Value::from(items.clone()),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

pub type Arguments = BTreeMap<String, ArgValue>;

/// A validated tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    tool_name: String,
    arguments: Arguments,
    sequence_index: usize,
    rationale: String,
}

impl ToolCall {
    pub(crate) fn new(
        tool_name: String,
        arguments: Arguments,
        sequence_index: usize,
        rationale: String,
    ) -> Self {
        Self {
            tool_name,
            arguments,
            sequence_index,
            rationale,
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn argument(&self, name: &str) -> Option<&ArgValue> {
        self.arguments.get(name)
    }

    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalAnswer {
    pub text: String,
    /// Pending confirmation by the plan's tool results
    #[serde(default)]
    pub provisional: bool,
}

impl TerminalAnswer {
    pub fn is_final(&self) -> bool {
        !self.provisional && !self.text.trim().is_empty()
    }
}

/// The planner's validated output for one turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionPlan {
    id: String,
    reasoning_steps: Vec<ReasoningStep>,
    tool_calls: Vec<ToolCall>,
    terminal_answer: Option<TerminalAnswer>,
}

impl DecisionPlan {
    pub(crate) fn new(
        id: String,
        reasoning_steps: Vec<ReasoningStep>,
        tool_calls: Vec<ToolCall>,
        terminal_answer: Option<TerminalAnswer>,
    ) -> Self {
        Self {
            id,
            reasoning_steps,
            tool_calls,
            terminal_answer,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn reasoning_steps(&self) -> &[ReasoningStep] {
        &self.reasoning_steps
    }

    /// Tool calls in `sequence_index` order
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub fn terminal_answer(&self) -> Option<&TerminalAnswer> {
        self.terminal_answer.as_ref()
    }

    pub fn steps_of(&self, kind: ReasoningKind) -> impl Iterator<Item = &ReasoningStep> {
        self.reasoning_steps.iter().filter(move |s| s.kind == kind)
    }

    /// A plan that answers directly without touching any tool
    pub fn concludes_directly(&self) -> bool {
        self.tool_calls.is_empty()
            && self
                .terminal_answer
                .as_ref()
                .map(TerminalAnswer::is_final)
                .unwrap_or(false)
    }

    /// Back to the unvalidated shape, e.g. to validate again
    pub fn to_raw(&self) -> RawPlan {
        RawPlan {
            id: Some(self.id.clone()),
            reasoning_steps: self
                .reasoning_steps
                .iter()
                .map(|s| RawReasoningStep {
                    kind: s.kind.as_str().to_string(),
                    description: s.description.clone(),
                    confidence: s.confidence,
                })
                .collect(),
            tool_calls: self
                .tool_calls
                .iter()
                .map(|c| RawToolCall {
                    tool_name: c.tool_name.clone(),
                    arguments: c
                        .arguments
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect(),
                    sequence_index: Some(c.sequence_index as i64),
                    rationale: c.rationale.clone(),
                })
                .collect(),
            terminal_answer: self.terminal_answer.as_ref().map(|a| a.text.clone()),
            answer_provisional: self
                .terminal_answer
                .as_ref()
                .map(|a| a.provisional)
                .unwrap_or(false),
        }
    }
}

fn default_confidence() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReasoningStep {
    #[serde(alias = "type")]
    pub kind: String,
    pub description: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawToolCall {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub sequence_index: Option<i64>,
    #[serde(default, alias = "reasoning")]
    pub rationale: String,
}

/// Unvalidated plan as produced by a reasoning source
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawPlan {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub reasoning_steps: Vec<RawReasoningStep>,
    #[serde(default)]
    pub tool_calls: Vec<RawToolCall>,
    #[serde(default, alias = "final_answer")]
    pub terminal_answer: Option<String>,
    #[serde(default, alias = "verification_needed")]
    pub answer_provisional: bool,
}

impl RawPlan {
    pub fn push_step(&mut self, kind: ReasoningKind, description: impl Into<String>, confidence: f64) {
        self.reasoning_steps.push(RawReasoningStep {
            kind: kind.as_str().to_string(),
            description: description.into(),
            confidence,
        });
    }

    pub fn has_step(&self, kind: ReasoningKind) -> bool {
        self.reasoning_steps.iter().any(|s| s.kind == kind.as_str())
    }
}
