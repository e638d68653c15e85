use crate::candidate::Candidate;
use crate::parsers::card;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Parses a catalog search results page into candidates, in page order.
///
/// Cards are `div[role='group']` containers; pages without them fall back to
/// any element carrying an item id. Duplicate ids keep their first card.
pub fn parse(html: &str, base_url: &Url) -> Vec<Candidate> {
    let doc = Html::parse_document(html);

    let group_selector = Selector::parse("div[role='group']").unwrap();
    let id_selector = Selector::parse("[data-item-id], [data-product-id]").unwrap();

    let mut cards: Vec<_> = doc.select(&group_selector).collect();
    if cards.is_empty() {
        ::log::debug!("No product groups found, falling back to item id attributes");
        cards = doc.select(&id_selector).collect();
    }
    ::log::info!("Found {} product cards on page", cards.len());

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for (index, element) in cards.into_iter().enumerate() {
        let Some(candidate) = card::extract(element, base_url) else {
            continue;
        };
        if !seen.insert(candidate.id.clone()) {
            ::log::debug!(
                "Skipping duplicate product ID {} at card #{}",
                candidate.id,
                index + 1
            );
            continue;
        }
        candidates.push(candidate);
    }

    ::log::info!("Found {} unique products", candidates.len());
    candidates
}

/// Orders candidates by purchase count (highest first), then price (lowest first).
///
/// The sort is stable, so equally popular items keep their page order.
pub fn sort_by_popularity(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.purchase_count
            .cmp(&a.purchase_count)
            .then(a.price.total_cmp(&b.price))
    });
}
