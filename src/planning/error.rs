use thiserror::Error;

/// Structural violations found by the plan validator.
///
/// Every variant carries the index of the offending step or call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("plan has no reasoning steps")]
    EmptyReasoning,

    #[error("reasoning step {step_index} has unknown kind '{kind}'")]
    InvalidStepKind { step_index: usize, kind: String },

    #[error("plan has neither tool calls nor a final answer")]
    EmptyPlan,

    #[error("plan has tool calls and a final answer that is not marked provisional")]
    ConflictingAnswer,

    #[error("tool call {call_index} references unknown tool '{tool_name}'")]
    UnknownTool { call_index: usize, tool_name: String },

    #[error("tool call {call_index} ({tool_name}) is missing required argument '{argument}'")]
    MissingArgument {
        call_index: usize,
        tool_name: String,
        argument: String,
    },

    #[error("tool call {call_index} ({tool_name}) argument '{argument}' is not {expected}")]
    TypeMismatch {
        call_index: usize,
        tool_name: String,
        argument: String,
        expected: String,
    },

    #[error("tool call {call_index} ({tool_name}) passes undeclared argument '{argument}'")]
    UnknownArgument {
        call_index: usize,
        tool_name: String,
        argument: String,
    },

    #[error("tool call {call_index} has bad sequencing: {detail}")]
    BadSequencing { call_index: usize, detail: String },
}

impl ValidationError {
    /// Index of the offending call, for call-level violations
    pub fn call_index(&self) -> Option<usize> {
        match self {
            ValidationError::UnknownTool { call_index, .. }
            | ValidationError::MissingArgument { call_index, .. }
            | ValidationError::TypeMismatch { call_index, .. }
            | ValidationError::UnknownArgument { call_index, .. }
            | ValidationError::BadSequencing { call_index, .. } => Some(*call_index),
            _ => None,
        }
    }

    /// Note appended to the planner's input when re-planning after this failure
    pub fn repair_note(&self) -> String {
        let hint = match self {
            ValidationError::EmptyReasoning => "include at least one reasoning step",
            ValidationError::InvalidStepKind { .. } => {
                "use only GOAL_DECOMPOSITION, CONSTRAINT_ANALYSIS, SEARCH_STRATEGY, ROUTE_OPTIMIZATION, VERIFICATION or FALLBACK_PLANNING"
            }
            ValidationError::EmptyPlan => "either call tools or give a final answer",
            ValidationError::ConflictingAnswer => {
                "drop the final answer or mark it provisional when tools are called"
            }
            ValidationError::UnknownTool { .. } => "only call tools listed in the catalog",
            ValidationError::MissingArgument { .. } => "supply every required argument",
            ValidationError::TypeMismatch { .. } => "match the declared argument types",
            ValidationError::UnknownArgument { .. } => "pass only declared arguments",
            ValidationError::BadSequencing { .. } => {
                "number tool calls 0, 1, 2, ... without gaps or repeats"
            }
        };
        format!("Previous plan was rejected: {}; {}.", self, hint)
    }
}

/// Why a turn could not be planned
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("malformed perception input: {0}")]
    MalformedInput(String),

    #[error("reasoning source unavailable: {0}")]
    PlannerUnavailable(String),

    #[error("plan failed validation: {0}")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_note_names_violation() {
        let err = ValidationError::UnknownTool {
            call_index: 2,
            tool_name: "teleport".to_string(),
        };
        let note = err.repair_note();
        assert!(note.contains("tool call 2"));
        assert!(note.contains("teleport"));
        assert_eq!(err.call_index(), Some(2));
    }

    #[test]
    fn test_validation_converts_into_planning_error() {
        let err: PlanningError = ValidationError::EmptyPlan.into();
        assert!(matches!(err, PlanningError::Validation(ValidationError::EmptyPlan)));
    }
}
