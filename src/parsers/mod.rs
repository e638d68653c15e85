pub mod card;
pub mod catalog;
pub mod history;
pub mod shopping_list;

#[cfg(test)]
mod tests;

use crate::candidate::{Candidate, ShoppingItem};
use url::Url;

/// Kinds of pages the scrapers understand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Retail catalog search results
    SearchResults,
    /// One page of the previously purchased items listing
    PurchaseHistory,
    /// Voice-assistant shopping list
    ShoppingList,
    /// Anything else (sign-in pages, redirects, department listings)
    Other,
}

impl PageKind {
    /// Determines the page kind from its URL
    pub fn from_url(url: &str) -> Self {
        if url.contains("alexa-shopping-list") {
            ::log::debug!("Classifying as ShoppingList: {}", url);
            PageKind::ShoppingList
        } else if url.contains("/my-items") {
            ::log::debug!("Classifying as PurchaseHistory: {}", url);
            PageKind::PurchaseHistory
        } else if url.contains("/search") && url.contains("q=") {
            ::log::debug!("Classifying as SearchResults: {}", url);
            PageKind::SearchResults
        } else {
            ::log::debug!("Classifying as Other: {}", url);
            PageKind::Other
        }
    }
}

/// Result of parsing a page
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// Product records from a catalog or purchase-history page
    Candidates(Vec<Candidate>),
    /// Entries of the shopping list
    Items(Vec<ShoppingItem>),
    /// The page carries nothing we scrape
    Nothing,
}

impl Parsed {
    /// Number of records parsed
    pub fn len(&self) -> usize {
        match self {
            Parsed::Candidates(candidates) => candidates.len(),
            Parsed::Items(items) => items.len(),
            Parsed::Nothing => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Main parser that delegates to the page-specific scrapers
pub struct Parser;

impl Parser {
    /// Parse a page of a known kind.
    ///
    /// `page` is stamped on purchase-history candidates; `base_url` resolves
    /// relative product links.
    pub fn parse(html: &str, kind: PageKind, page: u32, base_url: &Url) -> Parsed {
        match kind {
            PageKind::SearchResults => Parsed::Candidates(catalog::parse(html, base_url)),
            PageKind::PurchaseHistory => Parsed::Candidates(history::parse(html, page, base_url)),
            PageKind::ShoppingList => Parsed::Items(shopping_list::parse(html)),
            PageKind::Other => Parsed::Nothing,
        }
    }

    /// Determine the page kind and page number from the URL, then parse
    pub fn parse_from_url(html: &str, url: &str) -> Parsed {
        let Ok(parsed_url) = Url::parse(url) else {
            ::log::warn!("Cannot parse page URL: {}", url);
            return Parsed::Nothing;
        };
        let kind = PageKind::from_url(url);
        Self::parse(html, kind, page_number(&parsed_url), &parsed_url)
    }
}

/// The `page` query parameter of a listing URL, 1 when absent
pub fn page_number(url: &Url) -> u32 {
    url.query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
        .filter(|page| *page > 0)
        .unwrap_or(1)
}
