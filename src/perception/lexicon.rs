//! Keyword tables shared by perception and rule-based planning

use serde::{Deserialize, Serialize};

/// Shop categories the keyword tables map onto
pub const CATEGORIES: &[&str] = &[
    "Fashion",
    "Jewelry",
    "Books",
    "Beauty",
    "Electronics",
    "Food",
    "Toys",
    "Sports",
    "Home",
    "Entertainment",
];

/// word -> search term (a category when it appears in `CATEGORIES`, else a tag)
const SHOP_WORDS: &[(&str, &str)] = &[
    ("gift", "gift"),
    ("gifts", "gift"),
    ("present", "gift"),
    ("presents", "gift"),
    ("clothes", "Fashion"),
    ("clothing", "Fashion"),
    ("dress", "Fashion"),
    ("fashion", "Fashion"),
    ("jacket", "Fashion"),
    ("handbag", "handbag"),
    ("shoes", "shoes"),
    ("sneakers", "sneakers"),
    ("jewelry", "Jewelry"),
    ("jewellery", "Jewelry"),
    ("necklace", "Jewelry"),
    ("ring", "ring"),
    ("watch", "watch"),
    ("book", "Books"),
    ("books", "Books"),
    ("stationery", "stationery"),
    ("perfume", "perfume"),
    ("makeup", "Beauty"),
    ("cosmetics", "Beauty"),
    ("skincare", "skincare"),
    ("beauty", "Beauty"),
    ("electronics", "Electronics"),
    ("phone", "phone"),
    ("laptop", "laptop"),
    ("headphones", "headphones"),
    ("toy", "Toys"),
    ("toys", "Toys"),
    ("games", "games"),
    ("sports", "Sports"),
    ("running", "running"),
    ("fitness", "fitness"),
    ("decor", "decor"),
    ("kitchen", "kitchen"),
    ("furniture", "Home"),
    ("movie", "Entertainment"),
    ("movies", "Entertainment"),
    ("cinema", "Entertainment"),
    ("film", "Entertainment"),
];

const DINING_WORDS: &[&str] = &[
    "lunch",
    "dinner",
    "breakfast",
    "brunch",
    "eat",
    "food",
    "restaurant",
    "restaurants",
    "coffee",
    "snack",
    "hungry",
    "meal",
    "cafe",
];

/// word -> facility kind
const FACILITY_WORDS: &[(&str, &str)] = &[
    ("restroom", "restroom"),
    ("restrooms", "restroom"),
    ("toilet", "restroom"),
    ("toilets", "restroom"),
    ("bathroom", "restroom"),
    ("washroom", "restroom"),
    ("atm", "atm"),
    ("cash", "atm"),
    ("nursing", "nursing_room"),
    ("parking", "parking"),
    ("elevator", "elevator"),
    ("elevators", "elevator"),
    ("lift", "elevator"),
    ("information", "info_desk"),
    ("info", "info_desk"),
];

const GENERIC_FACILITY_WORDS: &[&str] = &["facilities", "facility", "amenities"];

const EVENT_WORDS: &[&str] = &[
    "event",
    "events",
    "promotion",
    "promotions",
    "sale",
    "sales",
    "deals",
    "happening",
];

const HOURS_WORDS: &[&str] = &["open", "opens", "close", "closes", "closing", "hours", "opening"];

const WAIT_WORDS: &[&str] = &["wait", "waiting", "queue", "line", "busy", "crowded", "crowd"];

const LOST_WORDS: &[&str] = &["lost", "left", "dropped", "missing"];

const FOUND_WORDS: &[&str] = &["found", "handed", "turned"];

/// Words that signal shopping without saying what for
pub const GENERIC_SHOPPING_WORDS: &[&str] = &[
    "shop", "shops", "store", "stores", "buy", "shopping", "browse", "need", "want", "find",
];

pub const DIETARY_WORDS: &[(&str, &str)] = &[
    ("vegan", "vegan"),
    ("vegetarian", "vegetarian"),
    ("veggie", "vegetarian"),
    ("gluten-free", "gluten-free"),
    ("halal", "halal"),
];

/// What a task thread needs from the tool catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "need", rename_all = "snake_case")]
pub enum ThreadNeed {
    ShopSearch {
        category: Option<String>,
        keyword: Option<String>,
    },
    Dining,
    Locate {
        shop: String,
    },
    Hours {
        shop: String,
    },
    WaitTime {
        shop: String,
    },
    Facilities {
        kind: Option<String>,
    },
    Events,
    ReportLostItem {
        item: String,
        location: Option<String>,
    },
    SearchLostAndFound {
        item: String,
    },
    Unrecognized,
}

impl ThreadNeed {
    /// Short label used in reasoning traces
    pub fn label(&self) -> String {
        match self {
            ThreadNeed::ShopSearch {
                category: Some(c), ..
            } => c.to_lowercase(),
            ThreadNeed::ShopSearch {
                keyword: Some(k), ..
            } => k.clone(),
            ThreadNeed::ShopSearch { .. } => "shopping".to_string(),
            ThreadNeed::Dining => "dining".to_string(),
            ThreadNeed::Locate { shop } => format!("locate {}", shop),
            ThreadNeed::Hours { shop } => format!("hours of {}", shop),
            ThreadNeed::WaitTime { shop } => format!("wait at {}", shop),
            ThreadNeed::Facilities { kind } => kind.clone().unwrap_or_else(|| "facilities".to_string()),
            ThreadNeed::Events => "events".to_string(),
            ThreadNeed::ReportLostItem { item, .. } => format!("report lost {}", item),
            ThreadNeed::SearchLostAndFound { item } => format!("lost & found search for {}", item),
            ThreadNeed::Unrecognized => "unrecognized".to_string(),
        }
    }

    /// Threads that end in a physical visit and so take part in routing
    pub fn is_visit(&self) -> bool {
        matches!(self, ThreadNeed::ShopSearch { .. } | ThreadNeed::Dining)
    }

    /// Recognised only through a generic shopping word
    pub fn is_generic(&self) -> bool {
        matches!(
            self,
            ThreadNeed::ShopSearch {
                category: None,
                keyword: None
            }
        )
    }
}

pub fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn has_any(tokens: &[String], words: &[&str]) -> bool {
    tokens.iter().any(|t| words.contains(&t.as_str()))
}

fn lookup<'a>(tokens: &[String], table: &'a [(&str, &str)]) -> Option<&'a str> {
    tokens
        .iter()
        .find_map(|t| table.iter().find(|(w, _)| *w == t.as_str()).map(|(_, v)| *v))
}

/// Search term for the first shopping word in `text`
pub fn shop_term(text: &str) -> Option<&'static str> {
    lookup(&tokens(text), SHOP_WORDS)
}

pub fn facility_kind(text: &str) -> Option<&'static str> {
    lookup(&tokens(text), FACILITY_WORDS)
}

pub fn dietary_terms(text: &str) -> Vec<&'static str> {
    let toks = tokens(text);
    let mut found: Vec<&'static str> = Vec::new();
    for token in &toks {
        if let Some((_, term)) = DIETARY_WORDS.iter().find(|(w, _)| *w == token.as_str()) {
            if !found.contains(term) {
                found.push(term);
            }
        }
    }
    found
}

pub fn is_category(term: &str) -> bool {
    CATEGORIES.iter().any(|c| c.eq_ignore_ascii_case(term))
}

/// The item named after "my"/"a"/"the" in a lost-item request
fn lost_item(toks: &[String]) -> String {
    const DETERMINERS: &[&str] = &["my", "a", "an", "the", "our", "his", "her"];
    const NOT_ITEMS: &[&str] = &["lost", "found", "mall", "item", "thing"];
    toks.windows(2)
        .find(|pair| DETERMINERS.contains(&pair[0].as_str()) && !NOT_ITEMS.contains(&pair[1].as_str()))
        .map(|pair| pair[1].clone())
        .unwrap_or_else(|| "item".to_string())
}

/// Where a lost item was last seen, from "near ..." / "at ..." / "in ..."
fn lost_location(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    [" near ", " at ", " in ", " on "]
        .iter()
        .filter_map(|marker| lower.find(marker).map(|idx| idx + marker.len()))
        .min()
        .map(|start| lower[start..].trim().trim_end_matches(['.', '!', '?']).to_string())
        .filter(|loc| !loc.is_empty() && loc != "found")
}

/// Classify one goal text; `known_shops` are shop names the mall carries
pub fn classify_goal(text: &str, known_shops: &[String]) -> ThreadNeed {
    let toks = tokens(text);
    let lower = text.to_lowercase();

    if lower.contains("lost and found") || lower.contains("lost & found") || has_any(&toks, FOUND_WORDS) {
        return ThreadNeed::SearchLostAndFound {
            item: lost_item(&toks),
        };
    }
    if has_any(&toks, LOST_WORDS) {
        return ThreadNeed::ReportLostItem {
            item: lost_item(&toks),
            location: lost_location(text),
        };
    }

    if let Some(shop) = known_shops
        .iter()
        .find(|name| lower.contains(&name.to_lowercase()))
    {
        return if has_any(&toks, WAIT_WORDS) {
            ThreadNeed::WaitTime { shop: shop.clone() }
        } else if has_any(&toks, HOURS_WORDS) {
            ThreadNeed::Hours { shop: shop.clone() }
        } else {
            ThreadNeed::Locate { shop: shop.clone() }
        };
    }

    if let Some(kind) = lookup(&toks, FACILITY_WORDS) {
        return ThreadNeed::Facilities {
            kind: Some(kind.to_string()),
        };
    }
    if has_any(&toks, GENERIC_FACILITY_WORDS) {
        return ThreadNeed::Facilities { kind: None };
    }
    if has_any(&toks, EVENT_WORDS) {
        return ThreadNeed::Events;
    }
    if has_any(&toks, DINING_WORDS) {
        return ThreadNeed::Dining;
    }
    if let Some(term) = lookup(&toks, SHOP_WORDS) {
        return if is_category(term) {
            ThreadNeed::ShopSearch {
                category: Some(term.to_string()),
                keyword: None,
            }
        } else {
            ThreadNeed::ShopSearch {
                category: None,
                keyword: Some(term.to_string()),
            }
        };
    }
    if has_any(&toks, GENERIC_SHOPPING_WORDS) {
        return ThreadNeed::ShopSearch {
            category: None,
            keyword: None,
        };
    }
    ThreadNeed::Unrecognized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shops() -> Vec<String> {
        vec!["Green Bowl".to_string(), "Tech Haven".to_string()]
    }

    #[test]
    fn test_classify_shopping_and_dining() {
        assert_eq!(
            classify_goal("find a gift for my wife", &shops()),
            ThreadNeed::ShopSearch {
                category: None,
                keyword: Some("gift".to_string())
            }
        );
        assert_eq!(classify_goal("lunch", &shops()), ThreadNeed::Dining);
        assert_eq!(
            classify_goal("new running shoes", &shops()),
            ThreadNeed::ShopSearch {
                category: None,
                keyword: Some("running".to_string())
            }
        );
    }

    #[test]
    fn test_classify_named_shop() {
        assert_eq!(
            classify_goal("when does tech haven close", &shops()),
            ThreadNeed::Hours {
                shop: "Tech Haven".to_string()
            }
        );
        assert_eq!(
            classify_goal("where is Green Bowl", &shops()),
            ThreadNeed::Locate {
                shop: "Green Bowl".to_string()
            }
        );
    }

    #[test]
    fn test_classify_wait_time() {
        assert_eq!(
            classify_goal("how long is the wait at Green Bowl", &shops()),
            ThreadNeed::WaitTime {
                shop: "Green Bowl".to_string()
            }
        );
        assert_eq!(
            classify_goal("is tech haven busy right now", &shops()),
            ThreadNeed::WaitTime {
                shop: "Tech Haven".to_string()
            }
        );
    }

    #[test]
    fn test_classify_lost_items() {
        assert_eq!(
            classify_goal("I lost my wallet near the food court", &shops()),
            ThreadNeed::ReportLostItem {
                item: "wallet".to_string(),
                location: Some("the food court".to_string())
            }
        );
        assert_eq!(
            classify_goal("has anyone found a phone", &shops()),
            ThreadNeed::SearchLostAndFound {
                item: "phone".to_string()
            }
        );
    }

    #[test]
    fn test_classify_services() {
        assert_eq!(
            classify_goal("where is the nearest restroom", &shops()),
            ThreadNeed::Facilities {
                kind: Some("restroom".to_string())
            }
        );
        assert_eq!(classify_goal("any promotions today", &shops()), ThreadNeed::Events);
        assert_eq!(classify_goal("tell me a joke", &shops()), ThreadNeed::Unrecognized);
    }

    #[test]
    fn test_dietary_terms() {
        assert_eq!(dietary_terms("vegan and gluten-free lunch"), vec!["vegan", "gluten-free"]);
    }
}
