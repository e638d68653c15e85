use serde::{Deserialize, Serialize};

/// One scraped product record eligible for matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Retailer item id, unique within one result set
    pub id: String,

    /// Product title; an empty name marks the record as unusable
    #[serde(default)]
    pub name: String,

    /// Current price (0.0 when unknown)
    #[serde(default)]
    pub price: f64,

    /// Stock status (assumed in stock when unknown)
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,

    /// Set when the page marked the item as previously or frequently purchased
    #[serde(default)]
    pub frequently_bought: bool,

    /// "Bought N+ times" signal
    #[serde(default)]
    pub purchase_count: u32,

    /// Page of the purchase-history listing this record came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_page: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

fn default_in_stock() -> bool {
    true
}

impl Candidate {
    /// Create a candidate with the given id and name and default attributes
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price: 0.0,
            in_stock: true,
            frequently_bought: false,
            purchase_count: 0,
            source_page: None,
            product_url: None,
            image_url: None,
        }
    }

    /// Whether the record carries a usable name
    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// A scored projection of exactly one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub id: String,
    pub name: String,
    pub price: f64,

    /// Similarity score, 0-100
    pub score: u8,

    pub in_stock: bool,
    pub frequently_bought: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Purchase-history page to navigate back to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_page: Option<u32>,
}

impl MatchResult {
    /// Project a candidate into a result carrying `score`
    pub fn from_candidate(candidate: &Candidate, score: u8) -> Self {
        Self {
            id: candidate.id.clone(),
            name: candidate.name.clone(),
            price: candidate.price,
            score,
            in_stock: candidate.in_stock,
            frequently_bought: candidate.frequently_bought,
            product_url: candidate.product_url.clone(),
            image_url: candidate.image_url.clone(),
            source_page: candidate.source_page,
        }
    }
}

/// One entry of the voice-assistant shopping list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub name: String,

    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl ShoppingItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: default_quantity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_defaults_from_json() {
        let candidate: Candidate = serde_json::from_str(r#"{"id": "123"}"#).unwrap();
        assert_eq!(candidate.name, "");
        assert_eq!(candidate.price, 0.0);
        assert!(candidate.in_stock);
        assert!(!candidate.frequently_bought);
        assert_eq!(candidate.purchase_count, 0);
        assert_eq!(candidate.source_page, None);
        assert!(!candidate.has_name());
    }

    #[test]
    fn test_whitespace_name_is_missing() {
        assert!(!Candidate::new("1", "   ").has_name());
        assert!(Candidate::new("1", "Bread").has_name());
    }

    #[test]
    fn test_match_result_keeps_source_page() {
        let mut candidate = Candidate::new("H1", "2% Milk");
        candidate.source_page = Some(3);
        candidate.price = 3.5;

        let result = MatchResult::from_candidate(&candidate, 88);
        assert_eq!(result.id, "H1");
        assert_eq!(result.score, 88);
        assert_eq!(result.price, 3.5);
        assert_eq!(result.source_page, Some(3));
    }

    #[test]
    fn test_shopping_item_default_quantity() {
        let item: ShoppingItem = serde_json::from_str(r#"{"name": "eggs"}"#).unwrap();
        assert_eq!(item, ShoppingItem::new("eggs"));
    }
}
