use crate::BoxError;
use crate::browser::{CartWriter, PageSource};
use crate::candidate::{Candidate, MatchResult, ShoppingItem};
use crate::config::AppConfig;
use crate::matcher::Matcher;
use crate::parsers::{catalog, history, shopping_list};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// A shopping list entry that made it into the cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddedItem {
    pub item: String,
    pub quantity: u32,
    pub product_id: String,
    pub product_name: String,
    pub score: u8,
    /// Added from the purchase-history listing rather than search results
    pub from_history: bool,
}

impl AddedItem {
    fn new(item: &ShoppingItem, product: &MatchResult, from_history: bool) -> Self {
        Self {
            item: item.name.clone(),
            quantity: item.quantity,
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            score: product.score,
            from_history,
        }
    }
}

/// A shopping list entry that could not be added
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub item: String,
    pub reason: String,
}

/// Outcome of one pass over the shopping list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub added: Vec<AddedItem>,
    pub failed: Vec<FailedItem>,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.failed.is_empty()
    }
}

/// Result of the catalog step for one item
enum ItemOutcome {
    Added(AddedItem),
    /// Needs the purchase-history fallback; carries the catalog winner's name if there was one
    Pending(Option<String>),
}

/// Key identifying a list entry across passes
fn list_key(name: &str, quantity: u32) -> (String, u32) {
    (name.trim().to_lowercase(), quantity)
}

/// Moves shopping list items into the retailer cart
pub struct Pipeline {
    config: AppConfig,
    matcher: Matcher,
    history_matcher: Matcher,
    /// Entries already in the cart; forgotten once they leave the list
    added: HashSet<(String, u32)>,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        let matcher = Matcher::new(config.matching);
        let history_matcher = Matcher::new(config.history_matching());
        Self {
            config,
            matcher,
            history_matcher,
            added: HashSet::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run one pass: read the list, add what matches, fall back to purchase history for the rest.
    ///
    /// Only a failure to read the shopping list aborts the run; per-item
    /// failures end up in [`RunReport::failed`] and are retried next pass.
    /// Entries added by an earlier pass are skipped while they stay on the list.
    pub async fn run_once<B>(&mut self, browser: &mut B) -> Result<RunReport, BoxError>
    where
        B: PageSource + CartWriter,
    {
        let list_html = browser.fetch(&self.config.list_url).await?;
        let listed = shopping_list::parse(&list_html);

        let on_list: HashSet<_> = listed
            .iter()
            .map(|item| list_key(&item.name, item.quantity))
            .collect();
        self.added.retain(|key| on_list.contains(key));

        let items: Vec<ShoppingItem> = listed
            .into_iter()
            .filter(|item| !self.added.contains(&list_key(&item.name, item.quantity)))
            .collect();
        if items.is_empty() {
            ::log::info!("No new shopping list items, nothing to do");
            return Ok(RunReport::default());
        }
        ::log::info!("Processing {} shopping list items", items.len());

        let mut history_pool = None;
        if self.config.corroborate_with_history {
            history_pool = Some(self.load_history(browser).await?);
        }

        let mut report = RunReport::default();
        let mut pending = Vec::new();
        let delay = Duration::from_millis(self.config.item_delay_ms);

        for (index, item) in items.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(delay).await;
            }
            ::log::info!("[{}/{}] {}", index + 1, items.len(), item.name);

            match self.process_item(browser, item, history_pool.as_deref()).await {
                Ok(ItemOutcome::Added(added)) => report.added.push(added),
                Ok(ItemOutcome::Pending(hint)) => pending.push((item, hint)),
                Err(e) => {
                    ::log::warn!("Catalog search failed for '{}': {}", item.name, e);
                    pending.push((item, None));
                }
            }
        }

        if !pending.is_empty() {
            ::log::info!(
                "Trying purchase history for {} remaining items",
                pending.len()
            );
            let pool = match history_pool {
                Some(pool) => pool,
                None => self.load_history(browser).await?,
            };

            for (item, hint) in pending {
                match self.add_from_history(browser, item, hint.as_deref(), &pool).await {
                    Ok(added) => report.added.push(added),
                    Err(reason) => {
                        ::log::warn!("Could not add '{}': {}", item.name, reason);
                        report.failed.push(FailedItem {
                            item: item.name.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        for added in &report.added {
            self.added.insert(list_key(&added.item, added.quantity));
        }

        ::log::info!(
            "Run complete: {} added, {} failed",
            report.added.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Search the catalog for one item and add the winner if it is in stock
    async fn process_item<B>(
        &self,
        browser: &mut B,
        item: &ShoppingItem,
        history: Option<&[Candidate]>,
    ) -> Result<ItemOutcome, BoxError>
    where
        B: PageSource + CartWriter,
    {
        let url = self.config.search_url(&item.name)?;
        let html = browser.fetch(url.as_str()).await?;

        let mut candidates = catalog::parse(&html, &url);
        catalog::sort_by_popularity(&mut candidates);
        candidates.truncate(self.config.max_results);

        let Some(best) = self.matcher.find_best_match(&item.name, &candidates, history) else {
            return Ok(ItemOutcome::Pending(None));
        };

        if !best.in_stock {
            ::log::info!("'{}' is out of stock", best.name);
            return Ok(ItemOutcome::Pending(Some(best.name)));
        }

        if browser.add_to_cart(&best, item.quantity).await? {
            Ok(ItemOutcome::Added(AddedItem::new(
                item,
                &best,
                best.source_page.is_some(),
            )))
        } else {
            Ok(ItemOutcome::Pending(Some(best.name)))
        }
    }

    /// Match against previously purchased items with the stricter threshold.
    ///
    /// The catalog winner's name is tried first since it is the exact title
    /// the history listing shows; the raw list entry is the fallback.
    async fn add_from_history<B>(
        &self,
        browser: &mut B,
        item: &ShoppingItem,
        hint: Option<&str>,
        pool: &[Candidate],
    ) -> Result<AddedItem, String>
    where
        B: PageSource + CartWriter,
    {
        if pool.is_empty() {
            return Err("not found in catalog and purchase history is empty".to_string());
        }

        let mut queries = Vec::with_capacity(2);
        if let Some(hint) = hint {
            queries.push(hint);
        }
        if hint != Some(item.name.as_str()) {
            queries.push(item.name.as_str());
        }

        let Some(best) = queries
            .into_iter()
            .find_map(|query| self.history_matcher.find_best_match(query, pool, None))
        else {
            return Err("no confident match in catalog or purchase history".to_string());
        };

        if !best.in_stock {
            return Err(format!("'{}' is out of stock", best.name));
        }

        match browser.add_to_cart(&best, item.quantity).await {
            Ok(true) => {
                ::log::info!(
                    "Added '{}' from purchase history page {}",
                    best.name,
                    best.source_page.unwrap_or(1)
                );
                Ok(AddedItem::new(item, &best, true))
            }
            Ok(false) => Err(format!("add to cart failed for '{}'", best.name)),
            Err(e) => Err(format!("browser error adding '{}': {}", best.name, e)),
        }
    }

    /// Collect purchase-history candidates, stopping at the first empty or unreadable page
    async fn load_history<B: PageSource>(&self, browser: &mut B) -> Result<Vec<Candidate>, BoxError> {
        let mut pool = Vec::new();
        let mut seen = HashSet::new();

        for page in 1..=self.config.max_history_pages {
            let url = self.config.history_url(page)?;
            let html = match browser.fetch(url.as_str()).await {
                Ok(html) => html,
                Err(e) => {
                    ::log::warn!("Failed to load purchase history page {}: {}", page, e);
                    break;
                }
            };

            let candidates = history::parse(&html, page, &url);
            if candidates.is_empty() {
                ::log::debug!("Purchase history page {} is empty, stopping", page);
                break;
            }
            pool.extend(
                candidates
                    .into_iter()
                    .filter(|candidate| seen.insert(candidate.id.clone())),
            );
        }

        ::log::info!("Collected {} purchase history items", pool.len());
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::DryRun;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeBrowser {
        pages: HashMap<String, String>,
        fetched: Vec<String>,
        added: Vec<(String, u32, Option<u32>)>,
        rejected_ids: HashSet<String>,
    }

    impl FakeBrowser {
        fn page(mut self, url: impl ToString, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        fn fetch_count(&self, needle: &str) -> usize {
            self.fetched.iter().filter(|url| url.contains(needle)).count()
        }
    }

    impl PageSource for FakeBrowser {
        async fn fetch(&mut self, url: &str) -> Result<String, BoxError> {
            self.fetched.push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| format!("no page at {}", url).into())
        }
    }

    impl CartWriter for FakeBrowser {
        async fn add_to_cart(&mut self, item: &MatchResult, quantity: u32) -> Result<bool, BoxError> {
            if self.rejected_ids.contains(&item.id) {
                return Ok(false);
            }
            self.added.push((item.id.clone(), quantity, item.source_page));
            Ok(true)
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            item_delay_ms: 0,
            max_history_pages: 3,
            ..AppConfig::default()
        }
    }

    fn list(names: &[&str]) -> String {
        names
            .iter()
            .map(|name| format!(r#"<div class="shopping-list-item"><span>{name}</span></div>"#))
            .collect()
    }

    fn card(id: &str, name: &str, extra: &str) -> String {
        format!(
            r#"<div role="group" data-item-id="{id}"><a href="/ip/{id}"><span class="w_iUH7">{name}</span></a>{extra}</div>"#
        )
    }

    fn tile(id: &str, name: &str) -> String {
        format!(
            r#"<div class="my-items-tile" data-item-id="{id}"><a href="/ip/{id}"><span class="w_iUH7">{name}</span></a></div>"#
        )
    }

    fn browser(config: &AppConfig) -> FakeBrowser {
        let history_page = format!(
            "{}{}",
            tile("10450114", "Great Value 2% Milk, 1 Gal"),
            tile("333333", "Eggland's Best Large Eggs, 12 ct")
        );

        FakeBrowser::default()
            .page(&config.list_url, &list(&["2% milk", "eggs", "zzqx"]))
            .page(
                config.search_url("2% milk").unwrap(),
                &format!(
                    "{}{}",
                    card("55512345", "Silk Almond Milk", ""),
                    card("10450114", "Great Value 2% Milk, 1 Gal", "<span>Bought 5+ times</span>")
                ),
            )
            .page(
                config.search_url("eggs").unwrap(),
                &card("333333", "Eggland's Best Large Eggs, 12 ct", "<span>Out of stock</span>"),
            )
            .page(config.search_url("zzqx").unwrap(), "<html></html>")
            .page(config.history_url(1).unwrap(), &history_page)
            .page(config.history_url(2).unwrap(), "<html></html>")
    }

    #[tokio::test]
    async fn test_catalog_then_history_fallback() {
        let config = config();
        let mut fake = browser(&config);
        let mut pipeline = Pipeline::new(config);

        let report = pipeline.run_once(&mut fake).await.unwrap();

        assert_eq!(report.added.len(), 2);
        assert_eq!(report.added[0].item, "2% milk");
        assert_eq!(report.added[0].product_id, "10450114");
        assert!(!report.added[0].from_history);

        assert_eq!(report.added[1].item, "eggs");
        assert_eq!(report.added[1].product_id, "333333");
        assert!(report.added[1].from_history);

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].item, "zzqx");

        assert_eq!(
            fake.added,
            vec![
                ("10450114".to_string(), 1, None),
                ("333333".to_string(), 1, Some(1)),
            ]
        );
    }

    #[tokio::test]
    async fn test_history_loaded_once_and_stops_at_empty_page() {
        let config = config();
        let mut fake = browser(&config);
        let mut pipeline = Pipeline::new(config);

        pipeline.run_once(&mut fake).await.unwrap();

        assert_eq!(fake.fetch_count("/my-items?filter=All&page=1"), 1);
        assert_eq!(fake.fetch_count("/my-items?filter=All&page=2"), 1);
        assert_eq!(fake.fetch_count("/my-items?filter=All&page=3"), 0);
    }

    #[tokio::test]
    async fn test_empty_list_ends_run() {
        let config = config();
        let mut fake = FakeBrowser::default().page(&config.list_url, "<html><body></body></html>");
        let mut pipeline = Pipeline::new(config);

        let report = pipeline.run_once(&mut fake).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(fake.fetched.len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_list_is_an_error() {
        let mut fake = FakeBrowser::default();
        let mut pipeline = Pipeline::new(config());
        assert!(pipeline.run_once(&mut fake).await.is_err());
    }

    #[tokio::test]
    async fn test_search_errors_do_not_abort_run() {
        let config = config();
        let mut fake = FakeBrowser::default()
            .page(&config.list_url, &list(&["Great Value 2% Milk, 1 Gal"]))
            .page(config.history_url(1).unwrap(), &tile("10450114", "Great Value 2% Milk, 1 Gal"));
        let mut pipeline = Pipeline::new(config);

        let report = pipeline.run_once(&mut fake).await.unwrap();
        assert_eq!(report.added.len(), 1);
        assert!(report.added[0].from_history);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_add_is_reported() {
        let config = config();
        let mut fake = browser(&config);
        fake.rejected_ids.insert("10450114".to_string());
        let mut pipeline = Pipeline::new(config);

        let report = pipeline.run_once(&mut fake).await.unwrap();

        let failed: Vec<&str> = report.failed.iter().map(|f| f.item.as_str()).collect();
        assert_eq!(failed, vec!["2% milk", "zzqx"]);
        assert!(report.failed[0].reason.contains("add to cart failed"));
    }

    #[tokio::test]
    async fn test_corroboration_uses_history_page() {
        let config = AppConfig {
            corroborate_with_history: true,
            ..config()
        };
        let mut fake = browser(&config).page(&config.list_url, &list(&["2% milk"]));
        let mut pipeline = Pipeline::new(config);

        let report = pipeline.run_once(&mut fake).await.unwrap();

        assert_eq!(report.added.len(), 1);
        assert_eq!(report.added[0].product_id, "10450114");
        assert!(report.added[0].from_history);
        assert_eq!(fake.added, vec![("10450114".to_string(), 1, Some(1))]);
        assert_eq!(fake.fetch_count("/my-items"), 2);
    }

    #[tokio::test]
    async fn test_max_results_truncates_after_popularity_sort() {
        let config = AppConfig {
            max_results: 1,
            ..config()
        };
        let mut fake = browser(&config).page(&config.list_url, &list(&["2% milk"]));
        let mut pipeline = Pipeline::new(config);

        let report = pipeline.run_once(&mut fake).await.unwrap();
        assert_eq!(report.added[0].product_id, "10450114");
    }

    #[tokio::test]
    async fn test_dry_run_records_instead_of_adding() {
        let config = config();
        let mut dry = DryRun::new(browser(&config));
        let mut pipeline = Pipeline::new(config);

        let report = pipeline.run_once(&mut dry).await.unwrap();

        assert_eq!(report.added.len(), 2);
        assert_eq!(dry.planned().len(), 2);
        assert!(dry.into_inner().added.is_empty());
    }

    #[tokio::test]
    async fn test_second_pass_skips_items_already_added() {
        let config = config();
        let mut fake = browser(&config);
        let mut pipeline = Pipeline::new(config);

        let first = pipeline.run_once(&mut fake).await.unwrap();
        assert_eq!(first.added.len(), 2);

        let second = pipeline.run_once(&mut fake).await.unwrap();
        assert!(second.added.is_empty());
        let failed: Vec<&str> = second.failed.iter().map(|f| f.item.as_str()).collect();
        assert_eq!(failed, vec!["zzqx"]);

        assert_eq!(
            fake.added,
            vec![
                ("10450114".to_string(), 1, None),
                ("333333".to_string(), 1, Some(1)),
            ]
        );
    }

    #[tokio::test]
    async fn test_item_added_again_after_leaving_the_list() {
        let config = config();
        let list_url = config.list_url.clone();
        let mut fake = browser(&config).page(&list_url, &list(&["2% milk"]));
        let mut pipeline = Pipeline::new(config);

        pipeline.run_once(&mut fake).await.unwrap();
        assert!(pipeline.run_once(&mut fake).await.unwrap().is_empty());

        fake.pages.insert(list_url.clone(), "<html></html>".to_string());
        assert!(pipeline.run_once(&mut fake).await.unwrap().is_empty());

        fake.pages.insert(list_url, list(&["2% Milk"]));
        let report = pipeline.run_once(&mut fake).await.unwrap();
        assert_eq!(report.added.len(), 1);
        assert_eq!(fake.added.len(), 2);
    }
}
