use regex::Regex;
use std::sync::LazyLock;

static PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(¢)?").expect("price pattern is valid"));

static BOUGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)bought\s+(\d+)\+?\s*times?").expect("purchase count pattern is valid")
});

/// Collapse runs of whitespace into single spaces and trim
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the first number from a price label such as "$3.48" or "current price $1,299.00".
///
/// Amounts marked with `¢` are converted to dollars.
pub fn parse_price(text: &str) -> Option<f64> {
    let stripped = text.replace([',', '$'], "");
    let caps = PRICE.captures(&stripped)?;
    let amount = caps[1].parse::<f64>().ok()?;
    if caps.get(2).is_some() {
        Some(amount / 100.0)
    } else {
        Some(amount)
    }
}

/// Extract N from "Bought N+ times"
pub fn parse_purchase_count(text: &str) -> Option<u32> {
    BOUGHT
        .captures(text)
        .and_then(|caps| caps[1].parse::<u32>().ok())
}

/// Item id from a product link like `/ip/Great-Value-Milk/10450114?athbdg=L1600`
pub fn item_id_from_href(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Whether a scraped id looks like a real item id
pub fn is_valid_item_id(id: &str) -> bool {
    id.len() >= 3 && id != "search"
}
