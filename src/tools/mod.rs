use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::mall::MallDirectory;
use crate::planning::types::{ArgValue, Arguments};

pub mod lost_found;
pub mod routing;
pub mod schema;
pub mod services;
pub mod shops;

pub use lost_found::{LogLostItemTool, SearchLostAndFoundTool};
pub use routing::{AccessibleRouteTool, RouteTool, VerifyRouteTool};
pub use schema::{FieldSpec, SemanticType, ToolSchema};
pub use services::{CheckWaitTimeTool, EventsTool, FacilitiesTool};
pub use shops::{AccessibilityInfoTool, RecommendationsTool, SearchShopsTool, ShopDetailsTool, ShopHoursTool};

/// Context passed to tool execution
#[derive(Clone, Copy)]
pub struct ToolContext<'a> {
    pub mall: &'a MallDirectory,
}

impl<'a> ToolContext<'a> {
    pub fn new(mall: &'a MallDirectory) -> Self {
        Self { mall }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> ToolSchema;
    /// Arguments have already been checked against `schema()`
    async fn execute(&self, args: &Arguments, ctx: &ToolContext<'_>) -> Result<String>;
}

/// Read-only description of a catalog entry, handed to the planner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub schema: ToolSchema,
}

struct CatalogEntry {
    tool: Box<dyn Tool>,
    schema: ToolSchema,
}

/// Static registry of callable mall operations and their argument schemas
pub struct ToolCatalog {
    entries: Vec<CatalogEntry>,
}

impl ToolCatalog {
    /// An empty catalog, mostly useful for tests
    pub fn empty() -> Self {
        Self { entries: vec![] }
    }

    pub fn new() -> Self {
        let mut catalog = Self::empty();
        // Shop lookups
        catalog.register(Box::new(SearchShopsTool));
        catalog.register(Box::new(RecommendationsTool));
        catalog.register(Box::new(ShopDetailsTool));
        catalog.register(Box::new(AccessibilityInfoTool));
        catalog.register(Box::new(ShopHoursTool));
        catalog.register(Box::new(CheckWaitTimeTool));
        // Routing
        catalog.register(Box::new(RouteTool));
        catalog.register(Box::new(AccessibleRouteTool));
        catalog.register(Box::new(VerifyRouteTool));
        // Mall services
        catalog.register(Box::new(FacilitiesTool));
        catalog.register(Box::new(EventsTool));
        catalog.register(Box::new(LogLostItemTool));
        catalog.register(Box::new(SearchLostAndFoundTool));
        catalog
    }

    /// Register a tool; a later tool with the same name replaces the earlier one
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let schema = tool.schema();
        match self.entries.iter().position(|e| e.tool.name() == tool.name()) {
            Some(idx) => self.entries[idx] = CatalogEntry { tool, schema },
            None => self.entries.push(CatalogEntry { tool, schema }),
        }
    }

    pub fn get_tool(&self, name: &str) -> Option<&dyn Tool> {
        self.entries
            .iter()
            .find(|e| e.tool.name() == name)
            .map(|e| e.tool.as_ref())
    }

    pub fn schema(&self, name: &str) -> Option<&ToolSchema> {
        self.entries
            .iter()
            .find(|e| e.tool.name() == name)
            .map(|e| &e.schema)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schema(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.tool.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptors in registration order
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.entries
            .iter()
            .map(|e| ToolDescriptor {
                name: e.tool.name().to_string(),
                description: e.tool.description().to_string(),
                schema: e.schema.clone(),
            })
            .collect()
    }

    pub fn get_tools_schema(&self) -> Vec<serde_json::Value> {
        self.entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "name": e.tool.name(),
                    "description": e.tool.description(),
                    "input_schema": e.schema.to_json_schema(),
                    "capabilities": e.schema.capabilities,
                })
            })
            .collect()
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn text_arg<'a>(args: &'a Arguments, name: &str) -> Option<&'a str> {
    args.get(name).and_then(ArgValue::as_text)
}

pub(crate) fn required_text<'a>(args: &'a Arguments, name: &str) -> Result<&'a str> {
    text_arg(args, name).ok_or_else(|| anyhow::anyhow!("missing text argument '{}'", name))
}

pub(crate) fn text_list_arg(args: &Arguments, name: &str) -> Vec<String> {
    args.get(name)
        .and_then(ArgValue::as_text_list)
        .map(<[String]>::to_vec)
        .unwrap_or_default()
}

pub(crate) fn floors_arg(args: &Arguments, name: &str) -> Option<std::collections::BTreeSet<i64>> {
    args.get(name)
        .and_then(ArgValue::as_integer_list)
        .filter(|floors| !floors.is_empty())
        .map(|floors| floors.iter().copied().collect())
}

pub(crate) fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
