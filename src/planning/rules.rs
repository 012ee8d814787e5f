//! Deterministic reasoning source
//!
//! Splits the perceived request into task threads, resolves the turn's
//! constraints, picks one catalog tool per thread by capability tag and
//! joins visit threads with a route. No network, no clock: the same
//! context always yields the same plan.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::context::PlanningContext;
use super::planner::ReasoningSource;
use super::types::{RawPlan, RawToolCall, ReasoningKind};
use crate::mall::BudgetTier;
use crate::perception::{classify_goal, ThreadNeed};
use crate::tools::schema::format_minutes;
use crate::tools::ToolDescriptor;

const ACCESSIBILITY_WORDS: &[&str] = &["wheelchair", "stroller", "elevator only", "step-free", "mobility"];
const DIETARY_WORDS: &[&str] = &["vegan", "vegetarian", "gluten-free", "halal"];

const STRATEGY_CONFIDENCE: f64 = 0.9;
const PENDING_VERIFICATION_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Explicit,
    Preferences,
    History,
}

impl Source {
    fn label(self) -> &'static str {
        match self {
            Source::Explicit => "explicit",
            Source::Preferences => "inferred from preferences",
            Source::History => "inferred from history",
        }
    }

    fn confidence(self) -> f64 {
        match self {
            Source::Explicit => 1.0,
            Source::Preferences | Source::History => 0.8,
        }
    }
}

#[derive(Debug)]
struct TaskThread {
    number: usize,
    goal: String,
    need: ThreadNeed,
}

impl TaskThread {
    fn tag(&self) -> String {
        format!("Thread {} ({})", self.number, self.need.label())
    }

    /// Capability a tool must carry to serve this thread
    fn capability(&self) -> Option<&'static str> {
        match self.need {
            ThreadNeed::ShopSearch { .. } | ThreadNeed::Dining => Some("shop_search"),
            ThreadNeed::Locate { .. } => Some("locate"),
            ThreadNeed::Hours { .. } => Some("hours"),
            ThreadNeed::WaitTime { .. } => Some("wait_time"),
            ThreadNeed::Facilities { .. } => Some("facilities"),
            ThreadNeed::Events => Some("events"),
            ThreadNeed::ReportLostItem { .. } => Some("lost_report"),
            ThreadNeed::SearchLostAndFound { .. } => Some("lost_search"),
            ThreadNeed::Unrecognized => None,
        }
    }

    /// Constraint tags that matter when choosing a tool for this thread
    fn relevant_tags(&self) -> &'static [&'static str] {
        match &self.need {
            ThreadNeed::ShopSearch {
                category: Some(_), ..
            } => &["floor_filter", "budget_filter"],
            ThreadNeed::ShopSearch { .. } => &["floor_filter", "budget_filter", "personalized"],
            ThreadNeed::Dining => &["floor_filter", "budget_filter", "dietary_filter"],
            ThreadNeed::Locate { .. } | ThreadNeed::Facilities { .. } => &["accessible"],
            _ => &[],
        }
    }
}

/// Constraints in force for this turn, each with where it came from
#[derive(Debug, Default)]
struct ActiveConstraints {
    time_budget: Option<(i64, Source)>,
    floor_restriction: Option<(BTreeSet<i64>, Source)>,
    monetary_budget: Option<(BudgetTier, Source)>,
    accessibility: Option<(String, Source)>,
    dietary: Option<(Vec<String>, Source)>,
    interests: Vec<String>,
}

impl ActiveConstraints {
    fn resolve(ctx: &PlanningContext, threads: &[TaskThread]) -> Self {
        let explicit = &ctx.perception.constraints;
        let prefs = &ctx.preferences;
        let visits = threads.iter().any(|t| t.need.is_visit());
        let dining = threads.iter().any(|t| t.need == ThreadNeed::Dining);

        let monetary_budget = match (explicit.monetary_budget, prefs.budget_preference) {
            (Some(tier), _) => Some((tier, Source::Explicit)),
            (None, Some(tier)) if visits => Some((tier, Source::Preferences)),
            _ => None,
        };

        let accessibility = if explicit.accessibility == Some(true) {
            Some(("required".to_string(), Source::Explicit))
        } else if let Some(needs) = &prefs.accessibility_needs {
            Some((needs.clone(), Source::Preferences))
        } else if prefs.history_mentions(ACCESSIBILITY_WORDS) {
            Some(("required".to_string(), Source::History))
        } else {
            None
        };

        let stated: Vec<String> = ctx
            .perception
            .entity_values("dietary")
            .map(str::to_string)
            .collect();
        let dietary = if !stated.is_empty() {
            Some((stated, Source::Explicit))
        } else if dining && !prefs.dietary_restrictions.is_empty() {
            Some((prefs.dietary_restrictions.clone(), Source::Preferences))
        } else if dining {
            let mentioned: Vec<String> = DIETARY_WORDS
                .iter()
                .filter(|w| prefs.history_mentions(&[**w]))
                .map(|w| w.to_string())
                .collect();
            (!mentioned.is_empty()).then_some((mentioned, Source::History))
        } else {
            None
        };

        Self {
            time_budget: explicit.time_budget.map(|m| (m, Source::Explicit)),
            floor_restriction: explicit
                .floor_restriction
                .clone()
                .filter(|f| !f.is_empty())
                .map(|f| (f, Source::Explicit)),
            monetary_budget,
            accessibility,
            dietary,
            interests: prefs.preferred_categories.clone(),
        }
    }

    /// Capability tags of the constraints currently in force
    fn active_tags(&self) -> BTreeSet<&'static str> {
        let mut tags = BTreeSet::new();
        if self.time_budget.is_some() {
            tags.insert("time_check");
        }
        if self.floor_restriction.is_some() {
            tags.insert("floor_filter");
        }
        if self.monetary_budget.is_some() {
            tags.insert("budget_filter");
        }
        if self.accessibility.is_some() {
            tags.insert("accessible");
        }
        if self.dietary.is_some() {
            tags.insert("dietary_filter");
        }
        if !self.interests.is_empty() {
            tags.insert("personalized");
        }
        tags
    }

    /// (name, rendered value, source, tag) in reporting order
    fn entries(&self) -> Vec<(&'static str, String, Source, &'static str)> {
        let mut entries = Vec::new();
        if let Some((minutes, source)) = self.time_budget {
            entries.push(("time_budget", format_minutes(minutes), source, "time_check"));
        }
        if let Some((floors, source)) = &self.floor_restriction {
            entries.push(("floor_restriction", format_floors(floors), *source, "floor_filter"));
        }
        if let Some((tier, source)) = self.monetary_budget {
            entries.push(("monetary_budget", tier.to_string(), source, "budget_filter"));
        }
        if let Some((needs, source)) = &self.accessibility {
            entries.push(("accessibility", needs.clone(), *source, "accessible"));
        }
        if let Some((items, source)) = &self.dietary {
            entries.push((
                "dietary_restrictions",
                format!("{{{}}}", items.join(",")),
                *source,
                "dietary_filter",
            ));
        }
        entries
    }

    fn floors_json(&self) -> Option<Value> {
        self.floor_restriction
            .as_ref()
            .map(|(floors, _)| json!(floors.iter().collect::<Vec<_>>()))
    }
}

fn format_floors(floors: &BTreeSet<i64>) -> String {
    let list: Vec<String> = floors.iter().map(i64::to_string).collect();
    format!("{{{}}}", list.join(","))
}

struct Selection<'a> {
    tool: &'a ToolDescriptor,
    covered: Vec<&'static str>,
}

/// Best-covering tool for a capability; ties keep registration order
fn select_tool<'a>(
    ctx: &'a PlanningContext,
    capability: &str,
    wanted: &[&'static str],
) -> Option<Selection<'a>> {
    let mut best: Option<Selection<'a>> = None;
    for tool in ctx.tools_with(capability) {
        let covered: Vec<&'static str> = wanted
            .iter()
            .copied()
            .filter(|tag| tool.schema.has_capability(tag))
            .collect();
        if best
            .as_ref()
            .map_or(true, |b| covered.len() > b.covered.len())
        {
            best = Some(Selection { tool, covered });
        }
    }
    best
}

/// Every argument the thread could use; trimmed to the chosen tool's schema later
fn candidate_arguments(
    thread: &TaskThread,
    constraints: &ActiveConstraints,
) -> BTreeMap<String, Value> {
    let mut args = BTreeMap::new();
    let visit_filters = |args: &mut BTreeMap<String, Value>| {
        if let Some(floors) = constraints.floors_json() {
            args.insert("floors".to_string(), floors);
        }
        if let Some((tier, _)) = constraints.monetary_budget {
            args.insert("max_price".to_string(), json!(tier.as_str()));
            args.insert("budget".to_string(), json!(tier.as_str()));
        }
        if !constraints.interests.is_empty() {
            args.insert("interests".to_string(), json!(constraints.interests));
        }
    };

    match &thread.need {
        ThreadNeed::ShopSearch { category, keyword } => {
            if let Some(category) = category {
                args.insert("category".to_string(), json!(category));
            }
            if let Some(keyword) = keyword {
                args.insert("keyword".to_string(), json!(keyword));
            }
            let context = keyword
                .as_deref()
                .or(category.as_deref())
                .unwrap_or("general");
            args.insert("context".to_string(), json!(context));
            visit_filters(&mut args);
        }
        ThreadNeed::Dining => {
            args.insert("category".to_string(), json!("Food"));
            args.insert("context".to_string(), json!("dining"));
            if let Some((items, _)) = &constraints.dietary {
                args.insert("dietary".to_string(), json!(items));
            }
            visit_filters(&mut args);
        }
        ThreadNeed::Locate { shop } | ThreadNeed::Hours { shop } => {
            args.insert("shop_name".to_string(), json!(shop));
        }
        ThreadNeed::WaitTime { shop } => {
            args.insert("location_name".to_string(), json!(shop));
        }
        ThreadNeed::Facilities { kind } => {
            if let Some(kind) = kind {
                args.insert("facility_type".to_string(), json!(kind));
            }
            if constraints.accessibility.is_some() {
                args.insert("accessible_only".to_string(), json!(true));
            }
        }
        ThreadNeed::ReportLostItem { item, location } => {
            args.insert("description".to_string(), json!(item));
            if let Some(location) = location {
                args.insert("location".to_string(), json!(location));
            }
        }
        ThreadNeed::SearchLostAndFound { item } => {
            args.insert("item_type".to_string(), json!(item));
        }
        ThreadNeed::Events | ThreadNeed::Unrecognized => {}
    }
    args
}

/// Route stop for a visit thread
fn stop_term(thread: &TaskThread, constraints: &ActiveConstraints) -> Option<String> {
    match &thread.need {
        ThreadNeed::Dining => Some("Food".to_string()),
        ThreadNeed::ShopSearch { category, keyword } => category
            .clone()
            .or_else(|| keyword.clone())
            .or_else(|| constraints.interests.first().cloned()),
        _ => None,
    }
}

/// Why a thread could not be planned, phrased as a question for the user
struct Gap {
    thread: String,
    reason: String,
    question: String,
}

fn clarifying_question(thread: &TaskThread, missing: Option<&str>) -> String {
    match (&thread.need, missing) {
        (ThreadNeed::ReportLostItem { item, .. }, Some("location")) => {
            format!("Where did you last have your {}?", item)
        }
        (ThreadNeed::Unrecognized, _) => format!(
            "I'm not sure what you need for \"{}\". Are you looking for a shop, food, a facility, an event or lost & found?",
            thread.goal
        ),
        _ => format!(
            "I can't help with \"{}\" directly. Could you tell me more about what you're looking for?",
            thread.goal
        ),
    }
}

pub struct RuleBasedReasoner;

impl RuleBasedReasoner {
    pub fn new() -> Self {
        Self
    }

    pub fn plan(&self, ctx: &PlanningContext) -> RawPlan {
        let shop_names: Vec<String> = ctx
            .perception
            .entity_values("shop")
            .map(str::to_string)
            .collect();
        let threads: Vec<TaskThread> = ctx
            .perception
            .goals()
            .enumerate()
            .map(|(i, goal)| TaskThread {
                number: i + 1,
                goal: goal.to_string(),
                need: classify_goal(goal, &shop_names),
            })
            .collect();

        let mut plan = RawPlan::default();
        for thread in &threads {
            plan.push_step(
                ReasoningKind::GoalDecomposition,
                format!("{}: {}", thread.tag(), thread.goal),
                ctx.perception.confidence,
            );
        }

        let constraints = ActiveConstraints::resolve(ctx, &threads);
        for (name, value, source, _) in constraints.entries() {
            plan.push_step(
                ReasoningKind::ConstraintAnalysis,
                format!("{}={} ({})", name, value, source.label()),
                source.confidence(),
            );
        }
        let active = constraints.active_tags();

        let mut calls: Vec<RawToolCall> = Vec::new();
        let mut covered: BTreeSet<&'static str> = BTreeSet::new();
        let mut gaps: Vec<Gap> = Vec::new();

        for thread in &threads {
            let Some(capability) = thread.capability() else {
                gaps.push(Gap {
                    thread: thread.tag(),
                    reason: "no recognisable request".to_string(),
                    question: clarifying_question(thread, None),
                });
                continue;
            };
            let wanted: Vec<&'static str> = thread
                .relevant_tags()
                .iter()
                .copied()
                .filter(|tag| active.contains(tag))
                .collect();
            let Some(selection) = select_tool(ctx, capability, &wanted) else {
                gaps.push(Gap {
                    thread: thread.tag(),
                    reason: format!("no catalog tool offers '{}'", capability),
                    question: clarifying_question(thread, None),
                });
                continue;
            };

            let mut arguments = candidate_arguments(thread, &constraints);
            arguments.retain(|name, _| selection.tool.schema.declares(name));
            if let Some(missing) = selection
                .tool
                .schema
                .required
                .iter()
                .find(|f| !arguments.contains_key(f.name))
            {
                gaps.push(Gap {
                    thread: thread.tag(),
                    reason: format!("{} needs '{}'", selection.tool.name, missing.name),
                    question: clarifying_question(thread, Some(missing.name)),
                });
                continue;
            }

            let mut description = format!("{}: use {}", thread.tag(), selection.tool.name);
            if !selection.covered.is_empty() {
                description.push_str(&format!(" (covers {})", selection.covered.join(", ")));
            }
            if let (Some(Value::Array(_)), Some((floors, _))) =
                (arguments.get("floors"), &constraints.floor_restriction)
            {
                description.push_str(&format!(", restricted to floors {}", format_floors(floors)));
            }
            plan.push_step(ReasoningKind::SearchStrategy, description, STRATEGY_CONFIDENCE);

            covered.extend(selection.covered.iter().copied());
            calls.push(RawToolCall {
                tool_name: selection.tool.name.clone(),
                arguments,
                sequence_index: None,
                rationale: thread.tag(),
            });
        }

        let mut route_verified = false;
        let visit_threads: Vec<&TaskThread> = threads.iter().filter(|t| t.need.is_visit()).collect();
        if gaps.is_empty() && visit_threads.len() >= 2 {
            let stops: Vec<String> = visit_threads
                .iter()
                .filter_map(|t| stop_term(t, &constraints))
                .collect();
            let wanted: Vec<&'static str> = ["accessible", "floor_filter"]
                .into_iter()
                .filter(|tag| active.contains(tag))
                .collect();

            if let (Some(route), false) = (select_tool(ctx, "route", &wanted), stops.is_empty()) {
                let order: Vec<String> = visit_threads.iter().map(|t| t.need.label()).collect();
                let mut description = format!(
                    "Floor-ascending: stops visited lowest floor first, stops on the same floor keep the stated order ({})",
                    order.join(" -> ")
                );
                match &constraints.floor_restriction {
                    Some((floors, _)) => {
                        description.push_str(&format!(" within floors {}", format_floors(floors)))
                    }
                    None => description.push_str(" across all floors"),
                }
                description.push_str(&format!(" using {}", route.tool.name));
                plan.push_step(ReasoningKind::RouteOptimization, description, STRATEGY_CONFIDENCE);

                let mut arguments = BTreeMap::new();
                arguments.insert("stops".to_string(), json!(stops));
                if let Some(floors) = constraints.floors_json() {
                    arguments.insert("floors".to_string(), floors);
                }
                arguments.retain(|name, _| route.tool.schema.declares(name));
                covered.extend(route.covered.iter().copied());
                calls.push(RawToolCall {
                    tool_name: route.tool.name.clone(),
                    arguments,
                    sequence_index: None,
                    rationale: "Order stops across threads".to_string(),
                });

                if let (Some((minutes, _)), Some(check)) = (
                    constraints.time_budget,
                    select_tool(ctx, "route_check", &["time_check"]),
                ) {
                    let mut arguments = BTreeMap::new();
                    arguments.insert("stops".to_string(), json!(stops));
                    arguments.insert("max_time".to_string(), json!(minutes));
                    if let Some(floors) = constraints.floors_json() {
                        arguments.insert("floors".to_string(), floors);
                    }
                    arguments.retain(|name, _| check.tool.schema.declares(name));
                    route_verified = true;
                    calls.push(RawToolCall {
                        tool_name: check.tool.name.clone(),
                        arguments,
                        sequence_index: None,
                        rationale: format!("Check the route against the {} budget", format_minutes(minutes)),
                    });
                }
            }
        }

        // Verification
        let mut satisfied = Vec::new();
        let mut pending = Vec::new();
        if gaps.is_empty() {
            for (name, _, _, tag) in constraints.entries() {
                if name == "time_budget" {
                    pending.push(if route_verified {
                        "time_budget (pending verify_route result)".to_string()
                    } else {
                        "time_budget (no route to check it against)".to_string()
                    });
                } else if covered.contains(tag) {
                    satisfied.push(name.to_string());
                } else {
                    pending.push(format!("{} (no planned filter)", name));
                }
            }
        }
        let mut verification = if !gaps.is_empty() {
            "No tool calls planned; waiting for clarification".to_string()
        } else {
            let list = |items: &[String]| {
                if items.is_empty() {
                    "none".to_string()
                } else {
                    items.join(", ")
                }
            };
            format!(
                "Expected satisfied by planned filters: {}; unverified pending tool results: {}",
                list(&satisfied),
                list(&pending)
            )
        };
        if !ctx.repair_notes.is_empty() {
            verification.push_str(&format!(". Repair: {}", ctx.repair_notes.join(" ")));
        }
        let verification_confidence = if pending.is_empty() {
            1.0
        } else {
            PENDING_VERIFICATION_CONFIDENCE
        };
        plan.push_step(ReasoningKind::Verification, verification, verification_confidence);

        if let Some(first) = gaps.first() {
            let reasons: Vec<String> = gaps
                .iter()
                .map(|g| format!("{}: {}", g.thread, g.reason))
                .collect();
            plan.push_step(
                ReasoningKind::FallbackPlanning,
                format!("Capability gap, asking instead of calling tools. {}", reasons.join("; ")),
                1.0,
            );
            plan.terminal_answer = Some(first.question.clone());
            plan.answer_provisional = false;
            plan.tool_calls.clear();
            return plan;
        }

        for (index, call) in calls.iter_mut().enumerate() {
            call.sequence_index = Some(index as i64);
        }
        plan.tool_calls = calls;
        plan
    }
}

impl Default for RuleBasedReasoner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningSource for RuleBasedReasoner {
    fn name(&self) -> &str {
        "rules"
    }

    async fn decompose(&self, ctx: &PlanningContext) -> Result<RawPlan> {
        Ok(self.plan(ctx))
    }
}
