//! Field extraction shared by the catalog and purchase-history scrapers.

use crate::candidate::Candidate;
use crate::utils::{
    clean_text, is_valid_item_id, item_id_from_href, parse_price, parse_purchase_count,
};
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;
use url::Url;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

static PRODUCT_LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href*='/ip/']"));
static LINK_IDENTIFIER: LazyLock<Selector> = LazyLock::new(|| selector("a[link-identifier]"));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("img"));
static BADGE: LazyLock<Selector> =
    LazyLock::new(|| selector("[data-automation-id='badge']"));

static NAME: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "span.w_iUH7",
        "[data-automation-id='product-title']",
        ".product-title",
        "span[itemprop='name']",
    ]
    .into_iter()
    .map(selector)
    .collect()
});

static PRICE: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "[data-automation-id='product-price']",
        "[itemprop='price']",
        ".price-main",
        ".price-characteristic",
    ]
    .into_iter()
    .map(selector)
    .collect()
});

const OUT_OF_STOCK: [&str; 3] = ["out of stock", "sold out", "unavailable"];
const BADGES: [&str; 3] = ["frequently bought", "popular pick", "best seller"];

/// Text content of an element with whitespace collapsed
pub fn element_text(element: ElementRef) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

fn first_text(card: ElementRef, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .flat_map(|s| card.select(s))
        .map(element_text)
        .find(|text| !text.is_empty())
}

fn item_id(card: ElementRef, link: Option<ElementRef>) -> Option<String> {
    let attr = |name: &str| {
        card.value()
            .attr(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    attr("data-item-id")
        .or_else(|| attr("data-product-id"))
        .or_else(|| link.and_then(|l| l.value().attr("href")).and_then(item_id_from_href))
        .or_else(|| {
            card.select(&LINK_IDENTIFIER)
                .next()
                .and_then(|l| l.value().attr("link-identifier"))
                .map(str::to_string)
        })
}

fn price(card: ElementRef) -> f64 {
    PRICE
        .iter()
        .flat_map(|s| card.select(s))
        .filter_map(|element| {
            element
                .value()
                .attr("content")
                .and_then(parse_price)
                .or_else(|| parse_price(&element_text(element)))
        })
        .find(|price| *price > 0.0)
        .unwrap_or(0.0)
}

fn product_url(base_url: &Url, href: Option<&str>, id: &str) -> Option<String> {
    let target = match href {
        Some(href) => base_url.join(href),
        None => base_url.join(&format!("/ip/{}", id)),
    };
    target.ok().map(|mut url| {
        url.set_query(None);
        url.set_fragment(None);
        url.to_string()
    })
}

/// Extract a candidate from one product card.
///
/// Returns `None` for cards without a usable id or name.
pub fn extract(card: ElementRef, base_url: &Url) -> Option<Candidate> {
    let link = card.select(&PRODUCT_LINK).next();

    let Some(id) = item_id(card, link).filter(|id| is_valid_item_id(id)) else {
        ::log::trace!("Skipping card without a valid item id");
        return None;
    };

    let name = first_text(card, &NAME)
        .or_else(|| link.map(element_text).filter(|t| !t.is_empty()));
    let Some(name) = name else {
        ::log::debug!("Skipping product with no name (ID: {})", id);
        return None;
    };

    let card_text = element_text(card).to_lowercase();
    let purchase_count = parse_purchase_count(&card_text).unwrap_or(0);
    let in_stock = !OUT_OF_STOCK.iter().any(|p| card_text.contains(p));
    let badged = card.select(&BADGE).next().is_some()
        || BADGES.iter().any(|b| card_text.contains(b));

    let href = link.and_then(|l| l.value().attr("href"));

    let candidate = Candidate {
        product_url: product_url(base_url, href, &id),
        image_url: card
            .select(&IMAGE)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string),
        price: price(card),
        in_stock,
        frequently_bought: purchase_count > 0 || badged,
        purchase_count,
        source_page: None,
        id,
        name,
    };

    ::log::debug!(
        "Extracted product: {} (${}, bought {}+ times)",
        candidate.name,
        candidate.price,
        candidate.purchase_count
    );
    Some(candidate)
}
