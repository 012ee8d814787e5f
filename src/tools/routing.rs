use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::json;

use super::schema::{format_minutes, SemanticType, ToolSchema};
use super::{floors_arg, text_list_arg, to_pretty_json, Tool, ToolContext};
use crate::mall::Route;
use crate::planning::types::Arguments;

/// Floors counted as "lower" by verify_route
const LOWER_FLOOR_LIMIT: i64 = 2;

fn route_schema(accessible: bool) -> ToolSchema {
    let schema = ToolSchema::new()
        .required("stops", SemanticType::TextList, "Shop names or categories to visit, in request order")
        .optional("floors", SemanticType::IntegerList, "Floors the route may use");
    if accessible {
        schema.capabilities(&["route", "floor_filter", "accessible"])
    } else {
        schema.capabilities(&["route", "floor_filter"])
    }
}

fn build_route(args: &Arguments, ctx: &ToolContext<'_>, accessible: bool) -> Result<Route> {
    let stops = text_list_arg(args, "stops");
    if stops.is_empty() {
        bail!("A route needs at least one stop");
    }
    let floors = floors_arg(args, "floors");
    let route = ctx.mall.plan_route(&stops, floors.as_ref(), accessible);
    if route.stops.is_empty() {
        bail!("None of the requested stops could be found: {}", stops.join(", "));
    }
    tracing::debug!(
        "Planned route with {} stops over floors {:?}",
        route.stops.len(),
        route.floors_visited
    );
    Ok(route)
}

pub struct RouteTool;

#[async_trait]
impl Tool for RouteTool {
    fn name(&self) -> &str {
        "plan_route"
    }

    fn description(&self) -> &str {
        "Order a set of stops floor by floor and estimate walking time (15 min per shop, 3 min per floor)."
    }

    fn schema(&self) -> ToolSchema {
        route_schema(false)
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext<'_>) -> Result<String> {
        let route = build_route(args, ctx, false)?;
        to_pretty_json(&route)
    }
}

pub struct AccessibleRouteTool;

#[async_trait]
impl Tool for AccessibleRouteTool {
    fn name(&self) -> &str {
        "plan_accessible_route"
    }

    fn description(&self) -> &str {
        "Step-free route using elevators only, with extra time allowed (20 min per shop, 5 min per floor)."
    }

    fn schema(&self) -> ToolSchema {
        route_schema(true)
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext<'_>) -> Result<String> {
        let route = build_route(args, ctx, true)?;
        to_pretty_json(&json!({
            "route": route,
            "elevators": "Elevators 1-3, Central Atrium",
            "notes": "All listed shops are wheelchair accessible",
        }))
    }
}

pub struct VerifyRouteTool;

#[async_trait]
impl Tool for VerifyRouteTool {
    fn name(&self) -> &str {
        "verify_route"
    }

    fn description(&self) -> &str {
        "Check a route against a time budget, allowed floors, a floor count limit and required categories."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("stops", SemanticType::TextList, "Stops of the route to check")
            .optional("max_time", SemanticType::Duration, "Time budget for the whole route")
            .optional("floors", SemanticType::IntegerList, "Floors the route must stay on")
            .optional("required_categories", SemanticType::TextList, "Categories the route must cover")
            .optional("lower_floors_only", SemanticType::Boolean, "Only floors 1 and 2 are allowed")
            .optional("max_floors", SemanticType::Integer, "Most distinct floors the route may visit")
            .capabilities(&["route_check", "time_check", "floor_filter"])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext<'_>) -> Result<String> {
        let route = build_route(args, ctx, false)?;
        let mut issues = Vec::new();

        for term in &route.unresolved {
            issues.push(format!("'{}' is not reachable on the allowed floors", term));
        }

        if let Some(limit) = args.get("max_time").and_then(|v| v.as_duration_minutes()) {
            if route.estimated_time_minutes > limit {
                issues.push(format!(
                    "Estimated {} exceeds the {} budget",
                    format_minutes(route.estimated_time_minutes),
                    format_minutes(limit)
                ));
            }
        }

        let lower_only = args
            .get("lower_floors_only")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if lower_only {
            for stop in route.stops.iter().filter(|s| s.floor > LOWER_FLOOR_LIMIT) {
                issues.push(format!("{} is on floor {}", stop.shop_name, stop.floor));
            }
        }

        if let Some(limit) = args.get("max_floors").and_then(|v| v.as_integer()) {
            if route.floors_visited.len() as i64 > limit {
                issues.push(format!(
                    "Route visits {} floors, more than the limit of {}",
                    route.floors_visited.len(),
                    limit
                ));
            }
        }

        for category in text_list_arg(args, "required_categories") {
            if !route
                .stops
                .iter()
                .any(|s| s.category.eq_ignore_ascii_case(&category))
            {
                issues.push(format!("No {} stop on the route", category));
            }
        }

        to_pretty_json(&json!({
            "valid": issues.is_empty(),
            "issues": issues,
            "estimated_time_minutes": route.estimated_time_minutes,
            "floors_visited": route.floors_visited,
            "total_stops": route.stops.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mall::MallDirectory;
    use crate::planning::types::ArgValue;

    fn stops(names: &[&str]) -> ArgValue {
        ArgValue::TextList(names.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_route_orders_floor_ascending() {
        let mall = MallDirectory::builtin().unwrap();
        let ctx = ToolContext::new(&mall);
        let mut args = Arguments::new();
        args.insert("stops".to_string(), stops(&["Books", "Food"]));
        args.insert("floors".to_string(), ArgValue::IntegerList(vec![1, 2]));

        let out = RouteTool.execute(&args, &ctx).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["stops"][0]["shop_name"], "Green Bowl");
        assert_eq!(value["stops"][1]["shop_name"], "Page Turner Books");
        assert_eq!(value["estimated_time_minutes"], 36);
    }

    #[tokio::test]
    async fn test_accessible_route_allows_more_time() {
        let mall = MallDirectory::builtin().unwrap();
        let ctx = ToolContext::new(&mall);
        let mut args = Arguments::new();
        args.insert("stops".to_string(), stops(&["Green Bowl"]));

        let out = AccessibleRouteTool.execute(&args, &ctx).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["route"]["estimated_time_minutes"], 25);
        assert_eq!(value["route"]["accessible"], true);
    }

    #[tokio::test]
    async fn test_route_with_no_resolvable_stops_fails() {
        let mall = MallDirectory::builtin().unwrap();
        let ctx = ToolContext::new(&mall);
        let mut args = Arguments::new();
        args.insert("stops".to_string(), stops(&["unicorn stable"]));
        assert!(RouteTool.execute(&args, &ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_verify_route_reports_issues() {
        let mall = MallDirectory::builtin().unwrap();
        let ctx = ToolContext::new(&mall);
        let mut args = Arguments::new();
        args.insert("stops".to_string(), stops(&["Tech Haven", "Green Bowl"]));
        args.insert("max_time".to_string(), ArgValue::Duration(20));
        args.insert("lower_floors_only".to_string(), ArgValue::Boolean(true));
        args.insert("required_categories".to_string(), stops(&["Books"]));

        let out = VerifyRouteTool.execute(&args, &ctx).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["valid"], false);
        assert_eq!(value["issues"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_verify_route_checks_floor_count() {
        let mall = MallDirectory::builtin().unwrap();
        let ctx = ToolContext::new(&mall);
        let mut args = Arguments::new();
        args.insert("stops".to_string(), stops(&["Green Bowl", "Sole Society", "Starlight Cinema"]));
        args.insert("max_floors".to_string(), ArgValue::Integer(2));

        let out = VerifyRouteTool.execute(&args, &ctx).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["valid"], false);
        assert_eq!(
            value["issues"][0],
            "Route visits 3 floors, more than the limit of 2"
        );

        args.insert("max_floors".to_string(), ArgValue::Integer(3));
        let out = VerifyRouteTool.execute(&args, &ctx).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["valid"], true);
    }

    #[tokio::test]
    async fn test_verify_route_within_budget() {
        let mall = MallDirectory::builtin().unwrap();
        let ctx = ToolContext::new(&mall);
        let mut args = Arguments::new();
        args.insert("stops".to_string(), stops(&["gift", "Food"]));
        args.insert("max_time".to_string(), ArgValue::Duration(120));
        args.insert("floors".to_string(), ArgValue::IntegerList(vec![1, 2]));

        let out = VerifyRouteTool.execute(&args, &ctx).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["valid"], true);
    }
}
