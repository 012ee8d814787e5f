//! In-memory mall directory
//!
//! Shops, facilities, events and the lost & found ledger that the mall
//! tools answer from. The directory is loaded once; only the lost & found
//! ledger changes at runtime.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;

const BUILTIN_DATA: &str = include_str!("mall_data.json");

/// Price tier shared by shop listings and user budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTier {
    Low,
    Medium,
    High,
}

impl BudgetTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetTier::Low => "low",
            BudgetTier::Medium => "medium",
            BudgetTier::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" | "$" => Some(BudgetTier::Low),
            "medium" | "$$" => Some(BudgetTier::Medium),
            "high" | "$$$" => Some(BudgetTier::High),
            _ => None,
        }
    }

    /// Map a "$"-style price range onto a tier
    pub fn from_price_range(range: &str) -> Self {
        match range.chars().filter(|c| *c == '$').count() {
            0 | 1 => BudgetTier::Low,
            2 => BudgetTier::Medium,
            _ => BudgetTier::High,
        }
    }
}

impl fmt::Display for BudgetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    pub id: u32,
    pub name: String,
    pub category: String,
    pub floor: i64,
    pub description: String,
    /// Opening hours as "HH:MM-HH:MM"
    pub hours: String,
    pub price_range: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dietary_options: Vec<String>,
}

impl Shop {
    pub fn price_tier(&self) -> BudgetTier {
        BudgetTier::from_price_range(&self.price_range)
    }

    /// Whether a free-text term names this shop, its category, or one of its tags
    pub fn matches_term(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return false;
        }
        self.name.to_lowercase() == term
            || self.category.to_lowercase() == term
            || self.tags.iter().any(|t| t.to_lowercase() == term)
            || self.description.to_lowercase().contains(&term)
    }

    pub fn serves_all(&self, dietary: &[String]) -> bool {
        dietary.iter().all(|need| {
            self.dietary_options
                .iter()
                .any(|opt| opt.eq_ignore_ascii_case(need))
        })
    }

    /// Whether the shop is open at `minutes` past midnight
    pub fn is_open_at(&self, minutes: u32) -> Option<bool> {
        let (open, close) = self.hours.split_once('-')?;
        let open = parse_clock(open)?;
        let close = parse_clock(close)?;
        Some(minutes >= open && minutes < close)
    }
}

/// Parse "HH:MM" (24h, "24:00" allowed) into minutes past midnight
pub fn parse_clock(value: &str) -> Option<u32> {
    let (h, m) = value.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 24 || m > 59 || (h == 24 && m != 0) {
        return None;
    }
    Some(h * 60 + m)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facility {
    pub kind: String,
    /// 0 for parking levels below ground
    pub floor: i64,
    pub location: String,
    pub accessible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MallEvent {
    pub name: String,
    pub location: String,
    pub schedule: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MallData {
    pub name: String,
    pub floors: i64,
    pub shops: Vec<Shop>,
    #[serde(default)]
    pub facilities: Vec<Facility>,
    #[serde(default)]
    pub events: Vec<MallEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LostItem {
    pub item_id: u32,
    pub description: String,
    pub location: String,
    pub date: NaiveDate,
    pub contact_info: Option<String>,
    pub status: String,
}

/// One resolved stop of a route
#[derive(Debug, Clone, Serialize)]
pub struct RouteStop {
    pub sequence: usize,
    pub requested: String,
    pub shop_name: String,
    pub floor: i64,
    pub category: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Route {
    pub stops: Vec<RouteStop>,
    pub unresolved: Vec<String>,
    pub floors_visited: Vec<i64>,
    pub floor_changes: usize,
    pub estimated_time_minutes: i64,
    pub accessible: bool,
}

pub struct MallDirectory {
    data: MallData,
    lost_and_found: Mutex<Vec<LostItem>>,
}

impl MallDirectory {
    pub fn new(data: MallData) -> Self {
        Self {
            data,
            lost_and_found: Mutex::new(seed_lost_and_found()),
        }
    }

    /// The directory bundled with the crate
    pub fn builtin() -> Result<Self> {
        let data: MallData =
            serde_json::from_str(BUILTIN_DATA).context("Failed to parse built-in mall data")?;
        Ok(Self::new(data))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mall data from {}", path.display()))?;
        let data: MallData =
            serde_json::from_str(&content).context("Failed to parse mall data")?;
        tracing::info!("Loaded {} shops from {}", data.shops.len(), path.display());
        Ok(Self::new(data))
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn floor_count(&self) -> i64 {
        self.data.floors
    }

    pub fn shops(&self) -> &[Shop] {
        &self.data.shops
    }

    pub fn facilities(&self) -> &[Facility] {
        &self.data.facilities
    }

    pub fn events(&self) -> &[MallEvent] {
        &self.data.events
    }

    pub fn categories(&self) -> BTreeSet<String> {
        self.data.shops.iter().map(|s| s.category.clone()).collect()
    }

    pub fn find_shop(&self, name: &str) -> Option<&Shop> {
        let name = name.trim();
        self.data
            .shops
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Pick the shop that best answers a route stop such as "gift" or "Food"
    pub fn resolve_stop(&self, term: &str, floors: Option<&BTreeSet<i64>>) -> Option<&Shop> {
        let allowed = |shop: &&Shop| floors.map_or(true, |f| f.contains(&shop.floor));
        self.find_shop(term)
            .filter(allowed)
            .or_else(|| {
                self.data
                    .shops
                    .iter()
                    .filter(allowed)
                    .find(|s| s.category.eq_ignore_ascii_case(term.trim()))
            })
            .or_else(|| {
                self.data
                    .shops
                    .iter()
                    .filter(allowed)
                    .find(|s| s.matches_term(term))
            })
    }

    /// Order stops floor-ascending, keeping the requested order within a floor
    pub fn plan_route(
        &self,
        stops: &[String],
        floors: Option<&BTreeSet<i64>>,
        accessible: bool,
    ) -> Route {
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();
        for term in stops {
            match self.resolve_stop(term, floors) {
                Some(shop) => resolved.push((term.clone(), shop)),
                None => unresolved.push(term.clone()),
            }
        }
        resolved.sort_by_key(|(_, shop)| shop.floor);

        let floors_visited: BTreeSet<i64> = resolved.iter().map(|(_, s)| s.floor).collect();
        let (per_stop, per_floor) = if accessible { (20, 5) } else { (15, 3) };
        let estimated_time_minutes =
            resolved.len() as i64 * per_stop + floors_visited.len() as i64 * per_floor;

        Route {
            stops: resolved
                .into_iter()
                .enumerate()
                .map(|(i, (requested, shop))| RouteStop {
                    sequence: i + 1,
                    requested,
                    shop_name: shop.name.clone(),
                    floor: shop.floor,
                    category: shop.category.clone(),
                })
                .collect(),
            unresolved,
            floor_changes: floors_visited.len().saturating_sub(1),
            floors_visited: floors_visited.into_iter().collect(),
            estimated_time_minutes,
            accessible,
        }
    }

    pub fn log_lost_item(
        &self,
        description: &str,
        location: &str,
        contact_info: Option<String>,
    ) -> LostItem {
        let mut ledger = self
            .lost_and_found
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let item_id = ledger.iter().map(|i| i.item_id).max().unwrap_or(0) + 1;
        let item = LostItem {
            item_id,
            description: description.to_string(),
            location: location.to_string(),
            date: Local::now().date_naive(),
            contact_info,
            status: "Logged - check back at Customer Service (Floor 1)".to_string(),
        };
        ledger.push(item.clone());
        item
    }

    pub fn search_lost_and_found(&self, item_type: &str) -> Vec<LostItem> {
        let needle = item_type.trim().to_lowercase();
        let ledger = self
            .lost_and_found
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ledger
            .iter()
            .filter(|item| item.description.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}

fn seed_lost_and_found() -> Vec<LostItem> {
    let found = |id: u32, description: &str, location: &str, (y, m, d): (i32, u32, u32)| LostItem {
        item_id: id,
        description: description.to_string(),
        location: location.to_string(),
        date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN),
        contact_info: None,
        status: "Available at Customer Service".to_string(),
    };
    vec![
        found(101, "Black phone in a leather case", "Floor 3, Food Court", (2025, 12, 13)),
        found(102, "Brown leather wallet", "Floor 1, near Fashion Forward", (2025, 12, 12)),
        found(103, "Car keys with a blue keychain", "Parking B2", (2025, 12, 14)),
    ]
}
