use crate::candidate::Candidate;
use crate::parsers::card;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Parses one page of the purchase-history listing.
///
/// Every candidate is stamped with `page` so the caller can navigate back to
/// it before adding the item to the cart.
pub fn parse(html: &str, page: u32, base_url: &Url) -> Vec<Candidate> {
    let doc = Html::parse_document(html);
    let tile_selector =
        Selector::parse("[data-item-id], [data-product-id], .my-items-tile").unwrap();

    let mut seen = HashSet::new();
    let candidates: Vec<Candidate> = doc
        .select(&tile_selector)
        .filter_map(|tile| card::extract(tile, base_url))
        .filter(|candidate| seen.insert(candidate.id.clone()))
        .map(|mut candidate| {
            candidate.source_page = Some(page);
            candidate
        })
        .collect();

    ::log::info!(
        "Found {} items on purchase history page {}",
        candidates.len(),
        page
    );
    candidates
}
