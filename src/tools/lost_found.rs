use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use super::schema::{SemanticType, ToolSchema};
use super::{required_text, text_arg, to_pretty_json, Tool, ToolContext};
use crate::planning::types::Arguments;

pub struct LogLostItemTool;

#[async_trait]
impl Tool for LogLostItemTool {
    fn name(&self) -> &str {
        "log_lost_item"
    }

    fn description(&self) -> &str {
        "Report an item the visitor lost in the mall."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("description", SemanticType::Text, "What was lost")
            .required("location", SemanticType::Text, "Where it was last seen")
            .optional("contact_info", SemanticType::Text, "Phone or email for follow-up")
            .capabilities(&["lost_report"])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext<'_>) -> Result<String> {
        let description = required_text(args, "description")?;
        let location = required_text(args, "location")?;
        let contact = text_arg(args, "contact_info").map(str::to_string);

        let item = ctx.mall.log_lost_item(description, location, contact);
        tracing::info!("Logged lost item #{}: {}", item.item_id, item.description);

        to_pretty_json(&json!({
            "status": "logged",
            "item": item,
            "next_steps": "Visit Customer Service on Floor 1 or wait for a call if contact info was given",
        }))
    }
}

pub struct SearchLostAndFoundTool;

#[async_trait]
impl Tool for SearchLostAndFoundTool {
    fn name(&self) -> &str {
        "search_lost_and_found"
    }

    fn description(&self) -> &str {
        "Search items handed in to lost & found."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("item_type", SemanticType::Text, "Kind of item, e.g. phone or wallet")
            .capabilities(&["lost_search"])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext<'_>) -> Result<String> {
        let item_type = required_text(args, "item_type")?;
        let matches = ctx.mall.search_lost_and_found(item_type);

        let message = if matches.is_empty() {
            format!("No {} has been handed in yet", item_type)
        } else {
            format!("Found {} matching item(s)", matches.len())
        };

        to_pretty_json(&json!({
            "found": !matches.is_empty(),
            "items": matches,
            "message": message,
        }))
    }
}
