use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;

use super::schema::{SemanticType, ToolSchema};
use super::{floors_arg, required_text, text_arg, text_list_arg, to_pretty_json, Tool, ToolContext};
use crate::mall::{parse_clock, BudgetTier, Shop};
use crate::planning::types::Arguments;

pub const PRICE_TIERS: &[&str] = &["low", "medium", "high"];

fn shop_summary(shop: &Shop) -> serde_json::Value {
    json!({
        "id": shop.id,
        "name": shop.name,
        "category": shop.category,
        "floor": shop.floor,
        "description": shop.description,
        "hours": shop.hours,
        "price_range": shop.price_range,
    })
}

// ============ search_shops ============

pub struct SearchShopsTool;

#[async_trait]
impl Tool for SearchShopsTool {
    fn name(&self) -> &str {
        "search_shops"
    }

    fn description(&self) -> &str {
        "Search for shops by category, keyword, floor, price tier or dietary options."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .optional("category", SemanticType::Text, "Shop category such as Fashion or Food")
            .optional("keyword", SemanticType::Text, "Word to match in shop name, tags or description")
            .optional("floors", SemanticType::IntegerList, "Only search these floors")
            .optional("max_price", SemanticType::Choice(PRICE_TIERS), "Highest acceptable price tier")
            .optional("dietary", SemanticType::TextList, "Dietary options every result must offer")
            .capabilities(&["shop_search", "floor_filter", "budget_filter", "dietary_filter"])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext<'_>) -> Result<String> {
        let category = text_arg(args, "category");
        let keyword = text_arg(args, "keyword");
        let floors = floors_arg(args, "floors");
        let max_price = text_arg(args, "max_price").and_then(BudgetTier::parse);
        let dietary = text_list_arg(args, "dietary");

        let results: Vec<_> = ctx
            .mall
            .shops()
            .iter()
            .filter(|s| category.map_or(true, |c| s.category.eq_ignore_ascii_case(c)))
            .filter(|s| keyword.map_or(true, |k| s.matches_term(k)))
            .filter(|s| floors.as_ref().map_or(true, |f| f.contains(&s.floor)))
            .filter(|s| max_price.map_or(true, |tier| s.price_tier() <= tier))
            .filter(|s| s.serves_all(&dietary))
            .map(shop_summary)
            .collect();

        tracing::debug!("search_shops matched {} shops", results.len());
        to_pretty_json(&json!({ "total": results.len(), "shops": results }))
    }
}

// ============ get_recommendations ============

pub struct RecommendationsTool;

fn categories_for_context(context: &str) -> Option<&'static [&'static str]> {
    match context.trim().to_lowercase().as_str() {
        "anniversary" | "romantic" | "date" => Some(&["Jewelry", "Fashion", "Food"]),
        "family" | "family_outing" => Some(&["Toys", "Food", "Entertainment"]),
        "quick_lunch" | "lunch" | "food" | "dining" => Some(&["Food"]),
        "gift" | "gift_shopping" => Some(&["Fashion", "Books", "Jewelry", "Beauty", "Home", "Toys"]),
        _ => None,
    }
}

#[async_trait]
impl Tool for RecommendationsTool {
    fn name(&self) -> &str {
        "get_recommendations"
    }

    fn description(&self) -> &str {
        "Context-aware shop suggestions (gift, anniversary, family, lunch) filtered by budget and interests."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("context", SemanticType::Text, "Occasion such as gift_shopping or family_outing")
            .optional("budget", SemanticType::Choice(PRICE_TIERS), "Budget preference")
            .optional("interests", SemanticType::TextList, "Preferred categories")
            .capabilities(&["shop_search", "budget_filter", "personalized"])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext<'_>) -> Result<String> {
        let context = required_text(args, "context")?;
        let budget = text_arg(args, "budget").and_then(BudgetTier::parse);
        let interests = text_list_arg(args, "interests");

        let by_context = categories_for_context(context);
        let wanted = |shop: &Shop| {
            let by_occasion = by_context.map_or(true, |cats| {
                cats.iter().any(|c| c.eq_ignore_ascii_case(&shop.category))
            });
            let by_interest = interests
                .iter()
                .any(|i| i.eq_ignore_ascii_case(&shop.category));
            by_occasion || by_interest
        };
        let affordable = |shop: &Shop| match budget {
            Some(BudgetTier::Low) => shop.price_tier() != BudgetTier::High,
            Some(BudgetTier::High) => shop.price_tier() != BudgetTier::Low,
            _ => true,
        };

        let suggestions: Vec<_> = ctx
            .mall
            .shops()
            .iter()
            .filter(|s| wanted(s) && affordable(s))
            .map(shop_summary)
            .collect();

        to_pretty_json(&json!({
            "context": context,
            "total_recommendations": suggestions.len(),
            "suggested_shops": suggestions,
        }))
    }
}

// ============ get_shop_details ============

pub struct ShopDetailsTool;

#[async_trait]
impl Tool for ShopDetailsTool {
    fn name(&self) -> &str {
        "get_shop_details"
    }

    fn description(&self) -> &str {
        "Full details and location of a named shop."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("shop_name", SemanticType::Text, "Name of the shop")
            .capabilities(&["locate", "shop_details"])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext<'_>) -> Result<String> {
        let name = required_text(args, "shop_name")?;
        let shop = ctx
            .mall
            .find_shop(name)
            .with_context(|| format!("Shop '{}' not found", name))?;
        to_pretty_json(shop)
    }
}

// ============ get_accessibility_info ============

pub struct AccessibilityInfoTool;

#[async_trait]
impl Tool for AccessibilityInfoTool {
    fn name(&self) -> &str {
        "get_accessibility_info"
    }

    fn description(&self) -> &str {
        "Location of a named shop with elevator access, aisle width and nearby accessible restrooms."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("shop_name", SemanticType::Text, "Name of the shop")
            .capabilities(&["locate", "accessible"])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext<'_>) -> Result<String> {
        let name = required_text(args, "shop_name")?;
        let shop = ctx
            .mall
            .find_shop(name)
            .with_context(|| format!("Shop '{}' not found", name))?;
        let restroom = ctx
            .mall
            .facilities()
            .iter()
            .find(|f| f.kind == "restroom" && f.floor == shop.floor && f.accessible);

        to_pretty_json(&json!({
            "shop_name": shop.name,
            "floor": shop.floor,
            "wheelchair_accessible": true,
            "elevator_access": format!("Elevators 1-3 serve floor {}", shop.floor),
            "wide_aisles": shop.floor <= 3,
            "accessible_restroom_nearby": restroom.map(|r| r.location.clone()),
            "distance_from_elevator_m": (shop.id % 5 + 1) * 10,
        }))
    }
}

// ============ check_shop_hours ============

pub struct ShopHoursTool;

#[async_trait]
impl Tool for ShopHoursTool {
    fn name(&self) -> &str {
        "check_shop_hours"
    }

    fn description(&self) -> &str {
        "Opening hours of a named shop, and whether it is open at a given time."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("shop_name", SemanticType::Text, "Name of the shop")
            .optional("current_time", SemanticType::Text, "Time as HH:MM (24h)")
            .capabilities(&["hours"])
    }

    async fn execute(&self, args: &Arguments, ctx: &ToolContext<'_>) -> Result<String> {
        let name = required_text(args, "shop_name")?;
        let shop = ctx
            .mall
            .find_shop(name)
            .with_context(|| format!("Shop '{}' not found", name))?;

        let open_now = match text_arg(args, "current_time") {
            Some(time) => {
                let minutes = parse_clock(time)
                    .with_context(|| format!("Invalid time '{}', expected HH:MM", time))?;
                shop.is_open_at(minutes)
            }
            None => None,
        };

        to_pretty_json(&json!({
            "shop_name": shop.name,
            "floor": shop.floor,
            "hours": shop.hours,
            "open": open_now,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mall::MallDirectory;
    use crate::planning::types::ArgValue;

    fn args(pairs: &[(&str, ArgValue)]) -> Arguments {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_search_shops_filters() {
        let mall = MallDirectory::builtin().unwrap();
        let ctx = ToolContext::new(&mall);
        let out = SearchShopsTool
            .execute(
                &args(&[
                    ("category", ArgValue::Text("Food".to_string())),
                    ("floors", ArgValue::IntegerList(vec![1, 2])),
                    ("dietary", ArgValue::TextList(vec!["vegan".to_string()])),
                ]),
                &ctx,
            )
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["total"], 1);
        assert_eq!(value["shops"][0]["name"], "Green Bowl");
    }

    #[tokio::test]
    async fn test_search_shops_price_cap() {
        let mall = MallDirectory::builtin().unwrap();
        let ctx = ToolContext::new(&mall);
        let out = SearchShopsTool
            .execute(
                &args(&[
                    ("keyword", ArgValue::Text("gift".to_string())),
                    ("max_price", ArgValue::Choice("medium".to_string())),
                ]),
                &ctx,
            )
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        let names: Vec<_> = value["shops"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap().to_string())
            .collect();
        assert!(names.contains(&"Page Turner Books".to_string()));
        assert!(!names.contains(&"Jewelry Junction".to_string()));
    }

    #[tokio::test]
    async fn test_shop_details_unknown_shop_fails() {
        let mall = MallDirectory::builtin().unwrap();
        let ctx = ToolContext::new(&mall);
        let result = ShopDetailsTool
            .execute(&args(&[("shop_name", ArgValue::Text("Nowhere".to_string()))]), &ctx)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_shop_hours_open_check() {
        let mall = MallDirectory::builtin().unwrap();
        let ctx = ToolContext::new(&mall);
        let out = ShopHoursTool
            .execute(
                &args(&[
                    ("shop_name", ArgValue::Text("bean there cafe".to_string())),
                    ("current_time", ArgValue::Text("07:30".to_string())),
                ]),
                &ctx,
            )
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["open"], false);
    }

    #[tokio::test]
    async fn test_recommendations_budget() {
        let mall = MallDirectory::builtin().unwrap();
        let ctx = ToolContext::new(&mall);
        let out = RecommendationsTool
            .execute(
                &args(&[
                    ("context", ArgValue::Text("anniversary".to_string())),
                    ("budget", ArgValue::Choice("low".to_string())),
                ]),
                &ctx,
            )
            .await
            .unwrap();
        assert!(!out.contains("Jewelry Junction"));
        assert!(out.contains("Green Bowl"));
    }
}
