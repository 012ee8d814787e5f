//! Perception: turns one utterance into a structured summary of intent
//!
//! The keyword perceiver splits compound requests into goals, pulls out
//! entities (categories, shops, facilities, dietary needs) and derives the
//! turn's explicit constraints. The LLM perceiver asks a model for the same
//! summary and falls back to keywords when the model fails.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::mall::{BudgetTier, MallDirectory};
use crate::tools::schema::parse_duration_minutes;

pub mod lexicon;
pub mod llm;

pub use lexicon::{classify_goal, ThreadNeed};
pub use llm::LlmPerceiver;

/// One extracted (kind, value) pair, e.g. ("category", "Food")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    pub kind: String,
    pub value: String,
}

impl Entity {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// Constraints stated explicitly in the current turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Minutes
    pub time_budget: Option<i64>,
    pub monetary_budget: Option<BudgetTier>,
    pub accessibility: Option<bool>,
    pub floor_restriction: Option<BTreeSet<i64>>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.time_budget.is_none()
            && self.monetary_budget.is_none()
            && self.accessibility.is_none()
            && self.floor_restriction.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionSummary {
    pub primary_goal: String,
    #[serde(default)]
    pub sub_goals: Vec<String>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub constraints: Constraints,
    pub confidence: f64,
    /// The utterance as received
    #[serde(default)]
    pub query: String,
}

impl PerceptionSummary {
    /// Primary goal followed by sub-goals
    pub fn goals(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_goal.as_str()).chain(self.sub_goals.iter().map(String::as_str))
    }

    pub fn entity_values<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entities
            .iter()
            .filter(move |e| e.kind == kind)
            .map(|e| e.value.as_str())
    }
}

#[async_trait]
pub trait Perceiver: Send + Sync {
    /// `None` when there is nothing to perceive (blank input)
    async fn perceive(&self, utterance: &str) -> Option<PerceptionSummary>;
}

lazy_static! {
    static ref GOAL_SEPARATOR: Regex =
        Regex::new(r"(?i)\s*(?:,?\s*\band then\b|\bthen\b|,\s*and\b|\band\b|;)\s*").unwrap();
    static ref TIME_PHRASE: Regex = Regex::new(
        r"(?i)\b(?:(?:in|within|for|under)\s+)?\d+(?:\.\d+)?\s*(?:hours?|hrs?|minutes?|mins?)\b"
    )
    .unwrap();
    static ref HOUR_WORDS: Regex =
        Regex::new(r"(?i)\b(?:(?:in|within|for|under)\s+)?(?:half an hour|an hour)\b").unwrap();
    static ref FLOOR_NUMBER: Regex =
        Regex::new(r"(?i)\b(?:(?:on\s+)?floor\s+(\d+)|(\d+)(?:st|nd|rd|th)\s+floor)(?:\s+only)?\b").unwrap();
    static ref FLOOR_BAND: Regex =
        Regex::new(r"(?i)\b(?:on\s+(?:the\s+)?)?(lower|upper|top|ground)\s+floors?(?:\s+only)?\b").unwrap();
    static ref ACCESSIBILITY: Regex = Regex::new(
        r"(?i)\b(?:in\s+a\s+|with\s+a\s+)?(?:wheelchair(?:\s+accessible)?|stroller|pram|elevators?\s+only|step-free|accessible|mobility\s+aid)\b"
    )
    .unwrap();
    static ref BUDGET_LOW: Regex =
        Regex::new(r"(?i)\b(?:cheap|budget|affordable|inexpensive|low[- ]cost)\b").unwrap();
    static ref BUDGET_MEDIUM: Regex = Regex::new(r"(?i)\b(?:mid-range|moderate|reasonably priced)\b").unwrap();
    static ref BUDGET_HIGH: Regex =
        Regex::new(r"(?i)\b(?:luxury|premium|expensive|high-end|fancy|designer)\b").unwrap();
    static ref LEFTOVER_PUNCT: Regex = Regex::new(r"\s*(?:,\s*)+").unwrap();
}

/// Keyword-table perceiver backed by the mall directory's shop names
pub struct KeywordPerceiver {
    shop_names: Vec<String>,
    top_floor: i64,
}

impl KeywordPerceiver {
    pub fn new(shop_names: Vec<String>, top_floor: i64) -> Self {
        Self {
            shop_names,
            top_floor,
        }
    }

    pub fn for_mall(mall: &MallDirectory) -> Self {
        Self::new(
            mall.shops().iter().map(|s| s.name.clone()).collect(),
            mall.floor_count(),
        )
    }

    fn constraints(&self, text: &str) -> Constraints {
        let mut constraints = Constraints::default();

        constraints.time_budget = TIME_PHRASE
            .find(text)
            .and_then(|m| parse_duration_minutes(m.as_str()))
            .or_else(|| {
                HOUR_WORDS.find(text).map(|m| {
                    if m.as_str().to_lowercase().contains("half") {
                        30
                    } else {
                        60
                    }
                })
            });

        let mut floors = BTreeSet::new();
        for caps in FLOOR_NUMBER.captures_iter(text) {
            if let Some(n) = caps
                .get(1)
                .or_else(|| caps.get(2))
                .and_then(|m| m.as_str().parse::<i64>().ok())
            {
                floors.insert(n);
            }
        }
        for caps in FLOOR_BAND.captures_iter(text) {
            match caps[1].to_lowercase().as_str() {
                "lower" => floors.extend([1, 2]),
                "upper" | "top" => floors.extend([self.top_floor - 1, self.top_floor]),
                _ => {
                    floors.insert(1);
                }
            }
        }
        if !floors.is_empty() {
            constraints.floor_restriction = Some(floors);
        }

        constraints.monetary_budget = if BUDGET_LOW.is_match(text) {
            Some(BudgetTier::Low)
        } else if BUDGET_HIGH.is_match(text) {
            Some(BudgetTier::High)
        } else if BUDGET_MEDIUM.is_match(text) {
            Some(BudgetTier::Medium)
        } else {
            None
        };

        if ACCESSIBILITY.is_match(text) {
            constraints.accessibility = Some(true);
        }

        constraints
    }

    fn entities(&self, text: &str, needs: &[ThreadNeed]) -> Vec<Entity> {
        let mut entities: Vec<Entity> = Vec::new();
        let mut push = |entity: Entity| {
            if !entities.contains(&entity) {
                entities.push(entity);
            }
        };

        let lower = text.to_lowercase();
        for name in &self.shop_names {
            if lower.contains(&name.to_lowercase()) {
                push(Entity::new("shop", name.clone()));
            }
        }
        for need in needs {
            match need {
                ThreadNeed::ShopSearch {
                    category: Some(c), ..
                } => push(Entity::new("category", c.clone())),
                ThreadNeed::ShopSearch {
                    keyword: Some(k), ..
                } => push(Entity::new("keyword", k.clone())),
                ThreadNeed::Dining => push(Entity::new("category", "Food")),
                ThreadNeed::Facilities { kind: Some(k) } => push(Entity::new("facility", k.clone())),
                ThreadNeed::ReportLostItem { item, .. } | ThreadNeed::SearchLostAndFound { item } => {
                    push(Entity::new("item", item.clone()))
                }
                _ => {}
            }
        }
        for term in lexicon::dietary_terms(text) {
            push(Entity::new("dietary", term));
        }
        entities
    }
}

/// Remove constraint phrases so only the goal itself remains
fn strip_constraint_phrases(goal: &str) -> String {
    let mut text = goal.to_string();
    for pattern in [
        &*TIME_PHRASE,
        &*HOUR_WORDS,
        &*FLOOR_NUMBER,
        &*FLOOR_BAND,
        &*ACCESSIBILITY,
    ] {
        text = pattern.replace_all(&text, "").into_owned();
    }
    let text = LEFTOVER_PUNCT.replace_all(&text, " ");
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_string()
}

impl KeywordPerceiver {
    pub fn shop_names(&self) -> &[String] {
        &self.shop_names
    }

    pub fn summarize(&self, utterance: &str) -> Option<PerceptionSummary> {
        let query = utterance.trim();
        if query.is_empty() {
            return None;
        }

        // Fragments that name no goal of their own belong to the one before
        let mut goals: Vec<(String, ThreadNeed)> = Vec::new();
        for fragment in GOAL_SEPARATOR.split(query) {
            let goal = strip_constraint_phrases(fragment);
            if goal.is_empty() {
                continue;
            }
            let need = classify_goal(&goal, &self.shop_names);
            match goals.last_mut() {
                Some((previous, _)) if need == ThreadNeed::Unrecognized => {
                    previous.push_str(" and ");
                    previous.push_str(&goal);
                }
                _ => goals.push((goal, need)),
            }
        }

        if goals.is_empty() {
            goals.push((query.to_string(), ThreadNeed::Unrecognized));
        }

        let needs: Vec<ThreadNeed> = goals.iter().map(|(_, need)| need.clone()).collect();
        let confidence = if needs
            .iter()
            .any(|n| *n != ThreadNeed::Unrecognized && !n.is_generic())
        {
            0.9
        } else if needs.iter().any(ThreadNeed::is_generic) {
            0.6
        } else {
            0.3
        };

        let mut goal_texts = goals.into_iter().map(|(text, _)| text);
        let primary_goal = goal_texts.next().unwrap_or_else(|| query.to_string());
        let summary = PerceptionSummary {
            primary_goal,
            sub_goals: goal_texts.collect(),
            entities: self.entities(query, &needs),
            constraints: self.constraints(query),
            confidence,
            query: query.to_string(),
        };

        tracing::debug!(
            "Perceived {} goal(s) with confidence {:.2}",
            1 + summary.sub_goals.len(),
            summary.confidence
        );
        Some(summary)
    }
}

#[async_trait]
impl Perceiver for KeywordPerceiver {
    async fn perceive(&self, utterance: &str) -> Option<PerceptionSummary> {
        self.summarize(utterance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perceiver() -> KeywordPerceiver {
        KeywordPerceiver::for_mall(&MallDirectory::builtin().unwrap())
    }

    #[test]
    fn test_compound_request_with_constraints() {
        let summary = perceiver()
            .summarize("find a gift for my wife and then lunch, 2 hours, lower floors only")
            .unwrap();
        assert_eq!(summary.primary_goal, "find a gift for my wife");
        assert_eq!(summary.sub_goals, vec!["lunch".to_string()]);
        assert_eq!(summary.constraints.time_budget, Some(120));
        assert_eq!(
            summary.constraints.floor_restriction,
            Some([1, 2].into_iter().collect())
        );
        assert_eq!(summary.constraints.accessibility, None);
        assert_eq!(summary.confidence, 0.9);
    }

    #[test]
    fn test_blank_input_has_no_perception() {
        assert!(perceiver().summarize("   ").is_none());
    }

    #[test]
    fn test_unrecognized_fragments_merge_into_previous_goal() {
        let summary = perceiver().summarize("buy a present for mom and dad").unwrap();
        assert_eq!(summary.primary_goal, "buy a present for mom and dad");
        assert!(summary.sub_goals.is_empty());
    }

    #[test]
    fn test_confidence_levels() {
        let p = perceiver();
        assert_eq!(p.summarize("I want to go shopping").unwrap().confidence, 0.6);
        assert_eq!(p.summarize("what is the meaning of life").unwrap().confidence, 0.3);
    }

    #[test]
    fn test_floor_and_budget_words() {
        let p = perceiver();
        let summary = p.summarize("cheap shoes on floor 2").unwrap();
        assert_eq!(summary.constraints.monetary_budget, Some(BudgetTier::Low));
        assert_eq!(
            summary.constraints.floor_restriction,
            Some([2].into_iter().collect())
        );

        let summary = p.summarize("dinner on the upper floors").unwrap();
        assert_eq!(
            summary.constraints.floor_restriction,
            Some([4, 5].into_iter().collect())
        );
    }

    #[test]
    fn test_accessibility_and_entities() {
        let summary = perceiver()
            .summarize("vegan lunch, I use a wheelchair")
            .unwrap();
        assert_eq!(summary.constraints.accessibility, Some(true));
        assert!(summary.entities.contains(&Entity::new("dietary", "vegan")));
        assert!(summary.entities.contains(&Entity::new("category", "Food")));
    }

    #[test]
    fn test_time_phrase_takes_its_preposition() {
        let p = perceiver();
        let summary = p.summarize("lunch in 30 minutes").unwrap();
        assert_eq!(summary.primary_goal, "lunch");
        assert_eq!(summary.constraints.time_budget, Some(30));

        let summary = p.summarize("coffee within half an hour").unwrap();
        assert_eq!(summary.primary_goal, "coffee");
        assert_eq!(summary.constraints.time_budget, Some(30));
    }

    #[test]
    fn test_named_shop_entity() {
        let summary = perceiver().summarize("when does Skyline Grill open").unwrap();
        assert_eq!(summary.entity_values("shop").collect::<Vec<_>>(), vec!["Skyline Grill"]);
    }
}
