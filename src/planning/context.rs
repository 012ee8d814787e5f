use serde::Serialize;

use crate::memory::PreferenceContext;
use crate::perception::PerceptionSummary;
use crate::tools::ToolDescriptor;

/// Everything a reasoning source may look at for one turn.
///
/// Built fresh per planning attempt and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct PlanningContext {
    pub perception: PerceptionSummary,
    pub preferences: PreferenceContext,
    /// Catalog entries in registration order
    pub tools: Vec<ToolDescriptor>,
    /// Violations from a rejected earlier attempt in this turn
    pub repair_notes: Vec<String>,
    pub min_confidence: f64,
}

impl PlanningContext {
    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Catalog tools carrying a capability tag, in registration order
    pub fn tools_with(&self, capability: &str) -> impl Iterator<Item = &ToolDescriptor> + '_ {
        let capability = capability.to_string();
        self.tools
            .iter()
            .filter(move |t| t.schema.has_capability(&capability))
    }
}
