//! Declared argument schemas for catalog tools
//!
//! Every tool declares its required and optional fields with a semantic
//! type plus a set of capability tags the planner selects on.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::planning::types::ArgValue;

/// Semantic type of a tool argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Text,
    Integer,
    Boolean,
    /// Minutes, given as an integer or a string like "2h" / "90 minutes"
    Duration,
    /// One of a fixed set of values
    Choice(&'static [&'static str]),
    TextList,
    IntegerList,
}

impl SemanticType {
    /// Convert a raw JSON value into a typed argument, `None` on mismatch
    pub fn coerce(&self, value: &serde_json::Value) -> Option<ArgValue> {
        use serde_json::Value;

        match (self, value) {
            (SemanticType::Text, Value::String(s)) => Some(ArgValue::Text(s.clone())),
            (SemanticType::Integer, Value::Number(n)) => n.as_i64().map(ArgValue::Integer),
            (SemanticType::Boolean, Value::Bool(b)) => Some(ArgValue::Boolean(*b)),
            (SemanticType::Duration, Value::Number(n)) => n
                .as_i64()
                .filter(|m| *m >= 0)
                .map(ArgValue::Duration),
            (SemanticType::Duration, Value::String(s)) => {
                parse_duration_minutes(s).map(ArgValue::Duration)
            }
            (SemanticType::Choice(options), Value::String(s)) => options
                .iter()
                .find(|opt| opt.eq_ignore_ascii_case(s.trim()))
                .map(|opt| ArgValue::Choice(opt.to_string())),
            (SemanticType::TextList, Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(ArgValue::TextList),
            (SemanticType::IntegerList, Value::Array(items)) => items
                .iter()
                .map(serde_json::Value::as_i64)
                .collect::<Option<Vec<_>>>()
                .map(ArgValue::IntegerList),
            _ => None,
        }
    }

    /// JSON-schema fragment used when describing tools to an LLM
    pub fn json_schema(&self) -> serde_json::Value {
        match self {
            SemanticType::Text => serde_json::json!({"type": "string"}),
            SemanticType::Integer => serde_json::json!({"type": "integer"}),
            SemanticType::Boolean => serde_json::json!({"type": "boolean"}),
            SemanticType::Duration => serde_json::json!({
                "type": ["integer", "string"],
                "description": "minutes, or a string such as \"2h\" or \"90m\""
            }),
            SemanticType::Choice(options) => serde_json::json!({"type": "string", "enum": options}),
            SemanticType::TextList => {
                serde_json::json!({"type": "array", "items": {"type": "string"}})
            }
            SemanticType::IntegerList => {
                serde_json::json!({"type": "array", "items": {"type": "integer"}})
            }
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::Text => write!(f, "text"),
            SemanticType::Integer => write!(f, "integer"),
            SemanticType::Boolean => write!(f, "boolean"),
            SemanticType::Duration => write!(f, "duration"),
            SemanticType::Choice(options) => write!(f, "one of [{}]", options.join(", ")),
            SemanticType::TextList => write!(f, "list of text"),
            SemanticType::IntegerList => write!(f, "list of integers"),
        }
    }
}

lazy_static! {
    static ref DURATION_PART: Regex =
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(hours?|hrs?|h|minutes?|mins?|m)").unwrap();
}

/// Parse "2h", "90m", "1h30m", "1.5 hours", "45 minutes" or a bare number of minutes
pub fn parse_duration_minutes(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(minutes) = text.parse::<i64>() {
        return (minutes >= 0).then_some(minutes);
    }

    let mut total = 0.0;
    let mut matched = false;
    for caps in DURATION_PART.captures_iter(text) {
        let amount: f64 = caps[1].parse().ok()?;
        let unit = caps[2].to_lowercase();
        total += if unit.starts_with('h') { amount * 60.0 } else { amount };
        matched = true;
    }
    matched.then(|| total.round() as i64)
}

/// Render minutes the way reasoning traces show them: "2h", "45m", "1h30m"
pub fn format_minutes(minutes: i64) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h{}m", h, m),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: SemanticType,
    pub description: &'static str,
}

impl FieldSpec {
    pub const fn new(name: &'static str, ty: SemanticType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            description,
        }
    }
}

/// Argument schema and capability tags of one tool
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ToolSchema {
    pub required: Vec<FieldSpec>,
    pub optional: Vec<FieldSpec>,
    pub capabilities: Vec<&'static str>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, ty: SemanticType, description: &'static str) -> Self {
        self.required.push(FieldSpec::new(name, ty, description));
        self
    }

    pub fn optional(mut self, name: &'static str, ty: SemanticType, description: &'static str) -> Self {
        self.optional.push(FieldSpec::new(name, ty, description));
        self
    }

    pub fn capabilities(mut self, tags: &[&'static str]) -> Self {
        self.capabilities.extend_from_slice(tags);
        self
    }

    /// Look up a declared field; the flag is true for required fields
    pub fn field(&self, name: &str) -> Option<(&FieldSpec, bool)> {
        self.required
            .iter()
            .find(|f| f.name == name)
            .map(|f| (f, true))
            .or_else(|| {
                self.optional
                    .iter()
                    .find(|f| f.name == name)
                    .map(|f| (f, false))
            })
    }

    pub fn declares(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| *c == tag)
    }

    pub fn to_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        for field in self.required.iter().chain(self.optional.iter()) {
            let mut schema = field.ty.json_schema();
            if let Some(obj) = schema.as_object_mut() {
                obj.entry("description")
                    .or_insert_with(|| serde_json::Value::from(field.description));
            }
            properties.insert(field.name.to_string(), schema);
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": self.required.iter().map(|f| f.name).collect::<Vec<_>>()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_minutes("120"), Some(120));
        assert_eq!(parse_duration_minutes("2h"), Some(120));
        assert_eq!(parse_duration_minutes("2 hours"), Some(120));
        assert_eq!(parse_duration_minutes("1h30m"), Some(90));
        assert_eq!(parse_duration_minutes("1.5 hours"), Some(90));
        assert_eq!(parse_duration_minutes("45 minutes"), Some(45));
        assert_eq!(parse_duration_minutes("soon"), None);
        assert_eq!(parse_duration_minutes("-5"), None);
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(120), "2h");
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(90), "1h30m");
    }

    #[test]
    fn test_coerce_by_type() {
        assert_eq!(
            SemanticType::Text.coerce(&json!("Food")),
            Some(ArgValue::Text("Food".to_string()))
        );
        assert_eq!(SemanticType::Text.coerce(&json!(3)), None);
        assert_eq!(SemanticType::Integer.coerce(&json!(3)), Some(ArgValue::Integer(3)));
        assert_eq!(SemanticType::Integer.coerce(&json!(2.5)), None);
        assert_eq!(
            SemanticType::Duration.coerce(&json!("2h")),
            Some(ArgValue::Duration(120))
        );
        assert_eq!(
            SemanticType::IntegerList.coerce(&json!([1, 2])),
            Some(ArgValue::IntegerList(vec![1, 2]))
        );
        assert_eq!(SemanticType::IntegerList.coerce(&json!([1, "2"])), None);
        assert_eq!(SemanticType::TextList.coerce(&json!("gift")), None);
    }

    #[test]
    fn test_choice_normalizes_case() {
        let ty = SemanticType::Choice(&["low", "medium", "high"]);
        assert_eq!(ty.coerce(&json!("Medium")), Some(ArgValue::Choice("medium".to_string())));
        assert_eq!(ty.coerce(&json!("luxury")), None);
    }

    #[test]
    fn test_schema_field_lookup() {
        let schema = ToolSchema::new()
            .required("shop_name", SemanticType::Text, "Name of the shop")
            .optional("current_time", SemanticType::Text, "HH:MM")
            .capabilities(&["hours"]);
        assert_eq!(schema.field("shop_name").map(|(_, req)| req), Some(true));
        assert_eq!(schema.field("current_time").map(|(_, req)| req), Some(false));
        assert!(!schema.declares("floor"));
        assert!(schema.has_capability("hours"));
        assert_eq!(schema.to_json_schema()["required"], json!(["shop_name"]));
    }
}
