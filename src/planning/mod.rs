//! Decision-making layer
//!
//! The planner turns a perceived turn into a raw plan, the validator checks
//! it against the tool catalog, and the executor runs the validated calls.

pub mod context;
pub mod error;
pub mod executor;
pub mod llm_reasoner;
pub mod planner;
pub mod rules;
pub mod types;
pub mod validator;

pub use context::PlanningContext;
pub use error::{PlanningError, ValidationError};
pub use executor::{ExecutionReport, PlanEvent, PlanExecutor, ToolOutcome};
pub use llm_reasoner::LlmReasoner;
pub use planner::{DecisionPlanner, ReasoningSource};
pub use rules::RuleBasedReasoner;
pub use types::{
    ArgValue, Arguments, DecisionPlan, RawPlan, RawReasoningStep, RawToolCall, ReasoningKind,
    ReasoningStep, TerminalAnswer, ToolCall,
};
pub use validator::PlanValidator;
