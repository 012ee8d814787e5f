use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;

use super::schema::{SemanticType, ToolSchema};
use super::{required_text, text_arg, to_pretty_json, Tool, ToolContext};
use crate::mall::Shop;
use crate::planning::types::Arguments;

pub const FACILITY_KINDS: &[&str] = &[
    "restroom",
    "atm",
    "nursing_room",
    "parking",
    "elevator",
    "info_desk",
];

pub struct FacilitiesTool;

#[async_trait]
impl Tool for FacilitiesTool {
    fn name(&self) -> &str {
        "get_mall_facilities"
    }

    fn description(&self) -> &str {
        "Locate restrooms, ATMs, nursing rooms, parking, elevators and the info desk."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .optional("facility_type", SemanticType::Choice(FACILITY_KINDS), "Kind of facility")
            .optional("accessible_only", SemanticType::Boolean, "Only wheelchair-accessible facilities")
            .capabilities(&["facilities", "accessible"])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext<'_>) -> Result<String> {
        let kind = text_arg(args, "facility_type");
        let accessible_only = args
            .get("accessible_only")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let facilities: Vec<_> = ctx
            .mall
            .facilities()
            .iter()
            .filter(|f| kind.map_or(true, |k| f.kind == k))
            .filter(|f| !accessible_only || f.accessible)
            .collect();

        to_pretty_json(&json!({
            "facility_type": kind.unwrap_or("all"),
            "total": facilities.len(),
            "facilities": facilities,
        }))
    }
}

pub struct EventsTool;

#[async_trait]
impl Tool for EventsTool {
    fn name(&self) -> &str {
        "get_current_events"
    }

    fn description(&self) -> &str {
        "Current promotions and events in the mall."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new().capabilities(&["events"])
    }

    async fn execute(&self, _args: &Arguments, ctx: &ToolContext<'_>) -> Result<String> {
        to_pretty_json(&json!({
            "mall": ctx.mall.name(),
            "events": ctx.mall.events(),
        }))
    }
}

/// Estimated wait in minutes; stable per shop, range set by category
pub fn estimated_wait_minutes(shop: &Shop) -> i64 {
    let (low, high) = match shop.category.as_str() {
        "Food" => (5, 30),
        "Entertainment" => (10, 45),
        _ => (0, 10),
    };
    let seed: i64 = shop.name.bytes().map(i64::from).sum();
    low + seed % (high - low + 1)
}

fn crowd_level(category: &str, wait: i64) -> &'static str {
    match category {
        "Food" if wait < 15 => "moderate",
        "Food" => "busy",
        "Entertainment" if wait > 25 => "busy",
        "Entertainment" => "moderate",
        _ => "low",
    }
}

pub struct CheckWaitTimeTool;

#[async_trait]
impl Tool for CheckWaitTimeTool {
    fn name(&self) -> &str {
        "check_wait_time"
    }

    fn description(&self) -> &str {
        "Current wait time and crowd level at a restaurant, attraction or shop."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("location_name", SemanticType::Text, "Name of the shop or restaurant")
            .capabilities(&["wait_time"])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext<'_>) -> Result<String> {
        let name = required_text(args, "location_name")?;
        let shop = ctx
            .mall
            .find_shop(name)
            .with_context(|| format!("Location '{}' not found", name))?;

        let wait = estimated_wait_minutes(shop);
        let recommendation = if wait < 15 {
            "Good time to visit"
        } else if wait > 30 {
            "Consider visiting later"
        } else {
            "Moderate wait expected"
        };

        to_pretty_json(&json!({
            "location": shop.name,
            "floor": shop.floor,
            "current_wait_time_minutes": wait,
            "crowd_level": crowd_level(&shop.category, wait),
            "recommendation": recommendation,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mall::MallDirectory;
    use crate::planning::types::ArgValue;

    #[tokio::test]
    async fn test_facilities_filtering() {
        let mall = MallDirectory::builtin().unwrap();
        let ctx = ToolContext::new(&mall);
        let mut args = Arguments::new();
        args.insert("facility_type".to_string(), ArgValue::Choice("restroom".to_string()));
        args.insert("accessible_only".to_string(), ArgValue::Boolean(true));

        let out = FacilitiesTool.execute(&args, &ctx).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["total"], 4);
    }

    #[tokio::test]
    async fn test_events_listing() {
        let mall = MallDirectory::builtin().unwrap();
        let ctx = ToolContext::new(&mall);
        let out = EventsTool.execute(&Arguments::new(), &ctx).await.unwrap();
        assert!(out.contains("Holiday Shopping Festival"));
    }

    #[tokio::test]
    async fn test_wait_time_depends_on_category() {
        let mall = MallDirectory::builtin().unwrap();
        let ctx = ToolContext::new(&mall);
        let mut args = Arguments::new();
        args.insert("location_name".to_string(), ArgValue::Text("starlight cinema".to_string()));

        let out = CheckWaitTimeTool.execute(&args, &ctx).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["location"], "Starlight Cinema");
        let wait = value["current_wait_time_minutes"].as_i64().unwrap();
        assert!((10..=45).contains(&wait), "{}", wait);

        let again = CheckWaitTimeTool.execute(&args, &ctx).await.unwrap();
        assert_eq!(out, again);

        for shop in mall.shops() {
            let wait = estimated_wait_minutes(shop);
            match shop.category.as_str() {
                "Food" => assert!((5..=30).contains(&wait)),
                "Entertainment" => assert!((10..=45).contains(&wait)),
                _ => assert!((0..=10).contains(&wait)),
            }
        }
    }

    #[tokio::test]
    async fn test_wait_time_for_unknown_location_fails() {
        let mall = MallDirectory::builtin().unwrap();
        let ctx = ToolContext::new(&mall);
        let mut args = Arguments::new();
        args.insert("location_name".to_string(), ArgValue::Text("Moon Base".to_string()));
        assert!(CheckWaitTimeTool.execute(&args, &ctx).await.is_err());
    }
}
