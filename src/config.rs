use crate::BoxError;
use crate::matcher::MatcherConfig;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use url::Url;

/// Configuration for a sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Run the browser without a window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Upper bound for loading one page
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    /// Time given to client-side rendering after navigation
    #[serde(default = "default_page_settle_ms")]
    pub page_settle_ms: u64,

    /// Exported browser cookies (one JSON file per site) loaded into the session
    #[serde(default)]
    pub cookie_files: Vec<PathBuf>,

    /// Voice-assistant shopping list page
    #[serde(default = "default_list_url")]
    pub list_url: String,

    /// Retailer site root used for search and purchase-history URLs
    #[serde(default = "default_retail_base_url")]
    pub retail_base_url: String,

    /// Catalog results kept per search
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Purchase-history pages scanned during fallback
    #[serde(default = "default_max_history_pages")]
    pub max_history_pages: u32,

    /// Pass the purchase-history pool to every catalog match
    #[serde(default)]
    pub corroborate_with_history: bool,

    /// Pause between shopping list items
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,

    /// Primary matcher settings
    #[serde(default)]
    pub matching: MatcherConfig,

    /// Stricter threshold for the purchase-history fallback
    #[serde(default = "default_history_min_score")]
    pub history_min_score: u8,

    /// Pause between scheduled runs
    #[serde(default = "default_schedule_interval_secs")]
    pub schedule_interval_secs: u64,
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_page_timeout_secs() -> u64 {
    45
}

fn default_page_settle_ms() -> u64 {
    2000
}

fn default_list_url() -> String {
    "https://www.amazon.com/gp/alexa-shopping-list".to_string()
}

fn default_retail_base_url() -> String {
    "https://www.walmart.com".to_string()
}

fn default_max_results() -> usize {
    40
}

fn default_max_history_pages() -> u32 {
    10
}

fn default_item_delay_ms() -> u64 {
    1000
}

fn default_history_min_score() -> u8 {
    80
}

fn default_schedule_interval_secs() -> u64 {
    240
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            page_timeout_secs: default_page_timeout_secs(),
            page_settle_ms: default_page_settle_ms(),
            cookie_files: Vec::new(),
            list_url: default_list_url(),
            retail_base_url: default_retail_base_url(),
            max_results: default_max_results(),
            max_history_pages: default_max_history_pages(),
            corroborate_with_history: false,
            item_delay_ms: default_item_delay_ms(),
            matching: MatcherConfig::default(),
            history_min_score: default_history_min_score(),
            schedule_interval_secs: default_schedule_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, BoxError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, BoxError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Override the WebDriver URL with the `WEBDRIVER_URL` environment variable if set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
        self
    }

    /// Check values serde cannot
    pub fn validate(&self) -> Result<(), BoxError> {
        if self.matching.min_score > 100 {
            return Err(format!("min_score {} is above 100", self.matching.min_score).into());
        }
        if self.history_min_score > 100 {
            return Err(format!("history_min_score {} is above 100", self.history_min_score).into());
        }
        if self.history_min_score < self.matching.min_score {
            return Err(format!(
                "history_min_score {} must not be below min_score {}",
                self.history_min_score, self.matching.min_score
            )
            .into());
        }
        Url::parse(&self.list_url)?;
        Url::parse(&self.retail_base_url)?;
        Url::parse(&self.webdriver_url)?;
        Ok(())
    }

    /// Catalog search URL for a query
    pub fn search_url(&self, query: &str) -> Result<Url, BoxError> {
        let mut url = Url::parse(&self.retail_base_url)?.join("/search")?;
        url.query_pairs_mut().append_pair("q", query);
        Ok(url)
    }

    /// URL of one purchase-history page
    pub fn history_url(&self, page: u32) -> Result<Url, BoxError> {
        let mut url = Url::parse(&self.retail_base_url)?.join("/my-items")?;
        url.query_pairs_mut()
            .append_pair("filter", "All")
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    /// Matcher settings for the purchase-history fallback
    pub fn history_matching(&self) -> MatcherConfig {
        self.matching.with_min_score(self.history_min_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Scorer;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.webdriver_url, "http://localhost:4444");
        assert!(config.headless);
        assert_eq!(config.matching.min_score, 70);
        assert_eq!(config.history_min_score, 80);
        assert_eq!(config.max_results, 40);
        assert_eq!(config.max_history_pages, 10);
        assert!(!config.corroborate_with_history);
        assert!(config.cookie_files.is_empty());
    }

    #[test]
    fn test_nested_matching_config() {
        let json = r#"{
            "matching": {"min_score": 60, "prefer_frequent": false, "scorer": "token_set"},
            "history_min_score": 75,
            "cookie_files": ["credentials/walmart_cookies.json"]
        }"#;
        let config = AppConfig::from_json(json).unwrap();
        assert_eq!(config.matching.min_score, 60);
        assert!(!config.matching.prefer_frequent);
        assert!(config.matching.prefer_in_stock);
        assert_eq!(config.matching.scorer, Scorer::TokenSet);

        let history = config.history_matching();
        assert_eq!(history.min_score, 75);
        assert!(!history.prefer_frequent);
        assert_eq!(config.cookie_files.len(), 1);
    }

    #[test]
    fn test_validation() {
        assert!(AppConfig::from_json(r#"{"matching": {"min_score": 101}, "history_min_score": 101}"#).is_err());
        assert!(AppConfig::from_json(r#"{"matching": {"min_score": 90}}"#).is_err());
        assert!(AppConfig::from_json(r#"{"retail_base_url": "not a url"}"#).is_err());
        assert!(AppConfig::from_json(r#"{"max_results": "many"}"#).is_err());
    }

    #[test]
    fn test_search_url_encodes_query() {
        let config = AppConfig::default();
        let url = config.search_url("2% milk & eggs").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.walmart.com/search?q=2%25+milk+%26+eggs"
        );
    }

    #[test]
    fn test_history_url() {
        let config = AppConfig::default();
        assert_eq!(
            config.history_url(3).unwrap().as_str(),
            "https://www.walmart.com/my-items?filter=All&page=3"
        );
    }

    #[test]
    fn test_from_missing_file() {
        assert!(AppConfig::from_file("does/not/exist.json").is_err());
    }
}
