use mall_assistant::agent::MallAgent;
use mall_assistant::config::PlannerConfig;
use mall_assistant::mall::MallDirectory;
use mall_assistant::memory::UserPreferences;
use mall_assistant::planning::{ArgValue, ReasoningKind, RuleBasedReasoner};
use std::sync::Arc;

fn agent() -> MallAgent {
    MallAgent::new(
        &PlannerConfig::default(),
        Arc::new(RuleBasedReasoner::new()),
        Arc::new(MallDirectory::builtin().unwrap()),
    )
}

#[tokio::test]
async fn test_dietary_restriction_carries_over_from_earlier_turn() {
    let mut agent = agent();
    agent.handle_turn("I'm vegan by the way").await;

    let outcome = agent.handle_turn("where can I get lunch").await;
    let plan = outcome.plan.unwrap();
    assert_eq!(
        plan.tool_calls()[0].argument("dietary"),
        Some(&ArgValue::TextList(vec!["vegan".to_string()]))
    );
    assert!(outcome.reply.contains("Green Bowl"));
    assert_eq!(agent.memory().len(), 4);
}

#[tokio::test]
async fn test_accessibility_preference_selects_accessible_route() {
    let mut agent = agent();
    agent.set_preferences(UserPreferences {
        accessibility_needs: Some("wheelchair".to_string()),
        ..UserPreferences::default()
    });

    let plan = agent.plan_only("find shoes and then dinner").await.unwrap();
    let tools: Vec<&str> = plan.tool_calls().iter().map(|c| c.tool_name()).collect();
    assert!(tools.contains(&"plan_accessible_route"), "{:?}", tools);
    assert_eq!(plan.steps_of(ReasoningKind::RouteOptimization).count(), 1);
}

#[tokio::test]
async fn test_lost_item_without_location_is_asked_for() {
    let mut agent = agent();
    let outcome = agent.handle_turn("I lost my umbrella").await;
    let plan = outcome.plan.unwrap();
    assert!(plan.tool_calls().is_empty());
    assert_eq!(outcome.reply, "Where did you last have your umbrella?");
    assert!(outcome.report.is_none());
}
