use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::llm::Role;
use crate::mall::BudgetTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShoppingStyle {
    Quick,
    Browsing,
    #[default]
    Balanced,
    Thorough,
}

impl ShoppingStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShoppingStyle::Quick => "quick",
            ShoppingStyle::Browsing => "browsing",
            ShoppingStyle::Balanced => "balanced",
            ShoppingStyle::Thorough => "thorough",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "quick" => Some(ShoppingStyle::Quick),
            "browsing" => Some(ShoppingStyle::Browsing),
            "balanced" => Some(ShoppingStyle::Balanced),
            "thorough" => Some(ShoppingStyle::Thorough),
            _ => None,
        }
    }
}

impl fmt::Display for ShoppingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Preferences collected before the conversation starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub shopping_style: ShoppingStyle,
    #[serde(default = "default_budget")]
    pub budget_preference: BudgetTier,
    #[serde(default)]
    pub preferred_categories: Vec<String>,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
    #[serde(default)]
    pub accessibility_needs: Option<String>,
}

fn default_budget() -> BudgetTier {
    BudgetTier::Medium
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            shopping_style: ShoppingStyle::default(),
            budget_preference: default_budget(),
            preferred_categories: Vec::new(),
            dietary_restrictions: Vec::new(),
            accessibility_needs: None,
        }
    }
}

impl UserPreferences {
    /// Trim list entries and treat "none"/blank accessibility needs as absent
    pub fn normalized(mut self) -> Self {
        let clean = |items: Vec<String>| -> Vec<String> {
            items
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
                .collect()
        };
        self.preferred_categories = clean(self.preferred_categories);
        self.dietary_restrictions = clean(self.dietary_restrictions);
        self.accessibility_needs = self
            .accessibility_needs
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Immutable per-turn view of preferences plus the visible history window
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PreferenceContext {
    pub shopping_style: ShoppingStyle,
    pub budget_preference: Option<BudgetTier>,
    pub preferred_categories: Vec<String>,
    pub dietary_restrictions: Vec<String>,
    pub accessibility_needs: Option<String>,
    pub history: Vec<HistoryTurn>,
}

impl PreferenceContext {
    pub fn from_preferences(preferences: &UserPreferences, history: Vec<HistoryTurn>) -> Self {
        let preferences = preferences.clone().normalized();
        Self {
            shopping_style: preferences.shopping_style,
            budget_preference: Some(preferences.budget_preference),
            preferred_categories: preferences.preferred_categories,
            dietary_restrictions: preferences.dietary_restrictions,
            accessibility_needs: preferences.accessibility_needs,
            history,
        }
    }

    /// User turns in the window that affirm any of `words`; negated mentions
    /// such as "I'm not vegan" or "no wheelchair" do not count
    pub fn history_mentions(&self, words: &[&str]) -> bool {
        self.history
            .iter()
            .filter(|turn| turn.role == Role::User)
            .any(|turn| {
                let content = turn.content.to_lowercase();
                words.iter().any(|w| affirms(&content, w))
            })
    }
}

const NEGATIONS: &[&str] = &["not", "no", "never", "without", "nor", "neither"];

/// Words before a mention that are searched for a negation
const NEGATION_WINDOW: usize = 4;

fn affirms(content: &str, word: &str) -> bool {
    content
        .match_indices(word)
        .any(|(pos, _)| !negated(&content[..pos]))
}

/// Whether the clause leading up to a mention negates it
fn negated(prefix: &str) -> bool {
    if prefix.ends_with("non-") || prefix.ends_with("non ") {
        return true;
    }
    let clause = prefix
        .rsplit(|c: char| matches!(c, ',' | '.' | ';' | '!' | '?'))
        .next()
        .unwrap_or(prefix);
    let clause = [" and ", " but ", " or "]
        .iter()
        .filter_map(|sep| clause.rfind(sep).map(|idx| idx + sep.len()))
        .max()
        .map_or(clause, |start| &clause[start..]);

    clause
        .split_whitespace()
        .rev()
        .take(NEGATION_WINDOW)
        .any(|w| NEGATIONS.contains(&w) || w.ends_with("n't") || w.ends_with("n\u{2019}t"))
}

/// Turns kept when no explicit capacity is given
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Preferences and conversation history for one session
#[derive(Debug)]
pub struct ConversationMemory {
    preferences: UserPreferences,
    history: VecDeque<HistoryTurn>,
    capacity: usize,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` turns; older turns are dropped first
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            preferences: UserPreferences::default(),
            history: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_preferences(&mut self, preferences: UserPreferences) {
        self.preferences = preferences.normalized();
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.preferences
    }

    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(HistoryTurn {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
    }

    /// The last `n` turns, oldest first
    pub fn recent(&self, n: usize) -> Vec<HistoryTurn> {
        let start = self.history.len().saturating_sub(n);
        self.history.iter().skip(start).cloned().collect()
    }

    pub fn snapshot(&self, history_window: usize) -> PreferenceContext {
        PreferenceContext::from_preferences(&self.preferences, self.recent(history_window))
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Start a new conversation; preferences are kept
    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_window() {
        let mut memory = ConversationMemory::new();
        for i in 0..7 {
            memory.add_message(Role::User, format!("message {}", i));
        }
        let recent = memory.recent(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].content, "message 2");
        assert_eq!(memory.recent(50).len(), 7);
    }

    #[test]
    fn test_accessibility_none_normalizes() {
        let mut memory = ConversationMemory::new();
        memory.set_preferences(UserPreferences {
            accessibility_needs: Some("None".to_string()),
            dietary_restrictions: vec!["vegan".to_string(), " ".to_string()],
            ..UserPreferences::default()
        });
        let snapshot = memory.snapshot(5);
        assert_eq!(snapshot.accessibility_needs, None);
        assert_eq!(snapshot.dietary_restrictions, vec!["vegan".to_string()]);
        assert_eq!(snapshot.budget_preference, Some(BudgetTier::Medium));
    }

    #[test]
    fn test_snapshot_is_detached_from_memory() {
        let mut memory = ConversationMemory::new();
        memory.add_message(Role::User, "I use a wheelchair");
        let snapshot = memory.snapshot(5);
        memory.clear();
        assert!(memory.is_empty());
        assert!(snapshot.history_mentions(&["wheelchair"]));
    }

    #[test]
    fn test_history_mentions_ignores_assistant_turns() {
        let mut memory = ConversationMemory::new();
        memory.add_message(Role::Assistant, "Elevators are wheelchair friendly");
        assert!(!memory.snapshot(5).history_mentions(&["wheelchair"]));
    }

    #[test]
    fn test_negated_mentions_are_not_inferred() {
        let mut memory = ConversationMemory::new();
        memory.add_message(Role::User, "I'm not vegan and I don't need a wheelchair");
        let snapshot = memory.snapshot(5);
        assert!(!snapshot.history_mentions(&["vegan"]));
        assert!(!snapshot.history_mentions(&["wheelchair"]));

        memory.add_message(Role::User, "no stroller today, but my friend is vegan");
        let snapshot = memory.snapshot(5);
        assert!(!snapshot.history_mentions(&["stroller"]));
        assert!(snapshot.history_mentions(&["vegan"]));
    }

    #[test]
    fn test_non_prefix_negates() {
        let mut memory = ConversationMemory::new();
        memory.add_message(Role::User, "we are non-vegetarian");
        assert!(!memory.snapshot(5).history_mentions(&["vegetarian"]));
    }

    #[test]
    fn test_history_is_capped() {
        let mut memory = ConversationMemory::with_capacity(4);
        for i in 0..10 {
            memory.add_message(Role::User, format!("message {}", i));
        }
        assert_eq!(memory.len(), 4);
        assert_eq!(memory.recent(10)[0].content, "message 6");
    }

    #[test]
    fn test_shopping_style_parse() {
        assert_eq!(ShoppingStyle::parse("Thorough"), Some(ShoppingStyle::Thorough));
        assert_eq!(ShoppingStyle::parse("frantic"), None);
    }
}
