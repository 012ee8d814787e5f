use serde_json::Value;

use crate::planning::{DecisionPlan, ExecutionReport, ToolOutcome};

const NOTHING_WORKED: &str =
    "I apologize, but I ran into a problem looking that up. Could you rephrase your request?";

/// Turns a plan and its tool results into the visitor-facing reply
pub struct ResponseComposer;

impl ResponseComposer {
    pub fn compose(plan: &DecisionPlan, report: Option<&ExecutionReport>) -> String {
        let answer = plan.terminal_answer().map(|a| a.text.trim().to_string());

        let Some(report) = report.filter(|r| !r.outcomes.is_empty()) else {
            return answer.unwrap_or_else(|| NOTHING_WORKED.to_string());
        };

        let mut sections: Vec<String> = report
            .outcomes
            .iter()
            .map(|outcome| {
                if outcome.success {
                    summarize(outcome)
                } else {
                    format!(
                        "I couldn't complete {}: {}",
                        outcome.tool_name.replace('_', " "),
                        outcome.error.as_deref().unwrap_or("unknown error")
                    )
                }
            })
            .collect();

        if report.outcomes.iter().any(|o| o.success) {
            if let Some(answer) = answer {
                sections.push(answer);
            }
        } else {
            sections.push(NOTHING_WORKED.to_string());
        }
        sections.join("\n\n")
    }
}

fn names(items: &[Value], key: &str) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| {
            let name = item.get(key)?.as_str()?;
            Some(match item.get("floor").and_then(Value::as_i64) {
                Some(floor) => format!("{} (floor {})", name, floor),
                None => name.to_string(),
            })
        })
        .collect()
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn summarize_route(route: &Value) -> String {
    let stops: Vec<String> = array(route, "stops")
        .iter()
        .filter_map(|s| {
            Some(format!(
                "{} (floor {})",
                s.get("shop_name")?.as_str()?,
                s.get("floor")?.as_i64()?
            ))
        })
        .collect();
    let minutes = route
        .get("estimated_time_minutes")
        .and_then(Value::as_i64)
        .unwrap_or_default();
    let mut text = format!("Suggested route: {} (about {} minutes)", stops.join(" -> "), minutes);
    let unresolved: Vec<&str> = array(route, "unresolved").iter().filter_map(Value::as_str).collect();
    if !unresolved.is_empty() {
        text.push_str(&format!(". No match found for: {}", unresolved.join(", ")));
    }
    text
}

fn summarize(outcome: &ToolOutcome) -> String {
    let output = outcome.output.as_deref().unwrap_or_default();
    let Ok(value) = serde_json::from_str::<Value>(output) else {
        return output.to_string();
    };

    match outcome.tool_name.as_str() {
        "search_shops" => {
            let shops = names(array(&value, "shops"), "name");
            if shops.is_empty() {
                "I couldn't find any shops matching that.".to_string()
            } else {
                format!("I found: {}", shops.join(", "))
            }
        }
        "get_recommendations" => {
            let shops = names(array(&value, "suggested_shops"), "name");
            if shops.is_empty() {
                "I don't have a recommendation for that yet.".to_string()
            } else {
                format!("You might like: {}", shops.join(", "))
            }
        }
        "get_shop_details" => format!(
            "{} is on floor {} ({}), open {}.",
            value["name"].as_str().unwrap_or_default(),
            value["floor"],
            value["category"].as_str().unwrap_or_default(),
            value["hours"].as_str().unwrap_or_default()
        ),
        "check_shop_hours" => {
            let name = value["shop_name"].as_str().unwrap_or_default();
            let hours = value["hours"].as_str().unwrap_or_default();
            match value["open"].as_bool() {
                Some(true) => format!("{} is open now ({}).", name, hours),
                Some(false) => format!("{} is closed right now; hours are {}.", name, hours),
                None => format!("{} is open {}.", name, hours),
            }
        }
        "check_wait_time" => format!(
            "The wait at {} is about {} minutes ({} crowds). {}.",
            value["location"].as_str().unwrap_or_default(),
            value["current_wait_time_minutes"],
            value["crowd_level"].as_str().unwrap_or("unknown"),
            value["recommendation"].as_str().unwrap_or_default()
        ),
        "get_accessibility_info" => format!(
            "{} on floor {} is wheelchair accessible. {}.",
            value["shop_name"].as_str().unwrap_or_default(),
            value["floor"],
            value["elevator_access"].as_str().unwrap_or_default()
        ),
        "plan_route" => summarize_route(&value),
        "plan_accessible_route" => format!(
            "{}, using {}.",
            summarize_route(&value["route"]),
            value["elevators"].as_str().unwrap_or("the elevators")
        ),
        "verify_route" => {
            if value["valid"].as_bool().unwrap_or(false) {
                format!(
                    "The route fits your constraints (about {} minutes).",
                    value["estimated_time_minutes"]
                )
            } else {
                let issues: Vec<&str> = array(&value, "issues").iter().filter_map(Value::as_str).collect();
                format!("Heads up: {}.", issues.join("; "))
            }
        }
        "get_mall_facilities" => {
            let found: Vec<String> = array(&value, "facilities")
                .iter()
                .filter_map(|f| {
                    Some(format!(
                        "{} at {}",
                        f.get("kind")?.as_str()?,
                        f.get("location")?.as_str()?
                    ))
                })
                .collect();
            format!("Nearest options: {}", found.join("; "))
        }
        "get_current_events" => {
            let events: Vec<String> = array(&value, "events")
                .iter()
                .filter_map(|e| {
                    Some(format!(
                        "{} ({}, {})",
                        e.get("name")?.as_str()?,
                        e.get("location")?.as_str()?,
                        e.get("schedule")?.as_str()?
                    ))
                })
                .collect();
            format!("Happening now: {}", events.join("; "))
        }
        "log_lost_item" => format!(
            "I've logged your lost item as report #{}. {}.",
            value["item"]["item_id"],
            value["next_steps"].as_str().unwrap_or_default()
        ),
        "search_lost_and_found" => {
            let message = value["message"].as_str().unwrap_or_default().to_string();
            let locations: Vec<String> = array(&value, "items")
                .iter()
                .filter_map(|i| {
                    Some(format!(
                        "{} (found at {})",
                        i.get("description")?.as_str()?,
                        i.get("location")?.as_str()?
                    ))
                })
                .collect();
            if locations.is_empty() {
                format!("{}.", message)
            } else {
                format!("{}: {}. Please bring ID to Customer Service on floor 1.", message, locations.join(", "))
            }
        }
        _ => output.to_string(),
    }
}
