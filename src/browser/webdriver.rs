use super::{CartWriter, PageSource};
use crate::BoxError;
use crate::candidate::MatchResult;
use crate::config::AppConfig;
use fantoccini::cookies::Cookie;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;

const ADD_BUTTON: &str =
    "button[data-automation-id='add-to-cart'], button[data-automation-id='atc']";
const INCREASE_BUTTON: &str = "button[aria-label*='Increase quantity']";

/// A browser session driven over WebDriver.
///
/// The connection is made lazily on first use and re-established once if the
/// remote session disappears mid-run.
pub struct WebDriverSession {
    config: AppConfig,
    client: Option<Client>,
}

impl WebDriverSession {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            config: config.clone(),
            client: None,
        }
    }

    fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.config.page_timeout_secs)
    }

    fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.config.page_settle_ms)
    }

    /// Returns the live client, connecting and loading cookies if needed
    async fn client(&mut self) -> Result<&Client, BoxError> {
        if self.client.is_none() {
            let client = connect_to_webdriver(&self.config.webdriver_url, self.config.headless)
                .await
                .ok_or("failed to connect to any WebDriver server")?;

            let loaded = load_cookies(&client, &self.config.cookie_files).await?;
            ::log::info!("Loaded {} cookies into browser session", loaded);
            self.client = Some(client);
        }

        self.client
            .as_ref()
            .ok_or_else(|| "WebDriver client unavailable".into())
    }

    /// Close the browser session if one is open
    pub async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.close().await {
                ::log::warn!("Failed to close WebDriver client: {}", e);
            }
        }
    }

    async fn load(&mut self, url: &str) -> Result<String, BoxError> {
        let page_timeout = self.page_timeout();
        let settle = self.settle_delay();
        let mut last_error: Option<BoxError> = None;

        for attempt in 0..2 {
            if attempt > 0 {
                ::log::warn!("Attempting to reconnect WebDriver session");
                self.client = None;
            }

            let client = self.client().await?;
            match load_page(client, url, page_timeout, settle).await {
                Ok(html) => {
                    ::log::debug!("Loaded {} ({} bytes)", url, html.len());
                    return Ok(html);
                }
                Err(e) if is_session_lost(&e) => {
                    ::log::warn!("Lost session while loading {}", url);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| format!("failed to load {}", url).into()))
    }

    /// Find the product card for an item on the current page
    async fn find_card(&mut self, id: &str) -> Result<Option<Element>, BoxError> {
        let wait = self.page_timeout().min(Duration::from_secs(10));
        let selector = format!(
            "[data-item-id='{id}'], [data-product-id='{id}'], div[role='group']:has(a[href*='/ip/'][href$='/{id}'])"
        );
        let client = self.client().await?;

        match client
            .wait()
            .at_most(wait)
            .for_element(Locator::Css(&selector))
            .await
        {
            Ok(card) => Ok(Some(card)),
            Err(e) if is_session_lost_cmd(&e) => Err(e.into()),
            Err(_) => Ok(None),
        }
    }

    /// Fall back to the product page when the listing has no card for the item
    async fn add_from_product_page(&mut self, item: &MatchResult, quantity: u32) -> Result<bool, BoxError> {
        let Some(product_url) = item.product_url.clone() else {
            return Ok(false);
        };
        ::log::debug!("Opening product page {}", product_url);
        self.load(&product_url).await?;

        let client = self.client().await?;
        let Ok(button) = client.find(Locator::Css(ADD_BUTTON)).await else {
            ::log::warn!("No add-to-cart button on {}", product_url);
            return Ok(false);
        };
        button.click().await?;
        increase_quantity(client, None, quantity).await?;
        Ok(true)
    }
}

impl PageSource for WebDriverSession {
    async fn fetch(&mut self, url: &str) -> Result<String, BoxError> {
        self.load(url).await
    }
}

impl CartWriter for WebDriverSession {
    async fn add_to_cart(&mut self, item: &MatchResult, quantity: u32) -> Result<bool, BoxError> {
        if !is_safe_id(&item.id) {
            ::log::warn!("Refusing to build a selector for item id '{}'", item.id);
            return Ok(false);
        }

        if let Some(page) = item.source_page {
            let url = self.config.history_url(page)?;
            ::log::debug!("Opening purchase history page {} for '{}'", page, item.name);
            self.load(url.as_str()).await?;
        }

        let Some(card) = self.find_card(&item.id).await? else {
            ::log::debug!("No card for item {} on the current page", item.id);
            return self.add_from_product_page(item, quantity).await;
        };

        let Ok(button) = card.find(Locator::Css(ADD_BUTTON)).await else {
            ::log::warn!("Card for item {} has no add-to-cart button", item.id);
            return self.add_from_product_page(item, quantity).await;
        };
        button.click().await?;

        let client = self.client().await?;
        increase_quantity(client, Some(&card), quantity).await?;

        ::log::info!("Added {} x '{}' to cart", quantity, item.name);
        Ok(true)
    }
}

/// Click the increase-quantity control until `quantity` is reached
async fn increase_quantity(
    client: &Client,
    card: Option<&Element>,
    quantity: u32,
) -> Result<(), BoxError> {
    for step in 1..quantity {
        // The stepper replaces the add button after the first click
        tokio::time::sleep(Duration::from_millis(500)).await;
        let button = match card {
            Some(card) => card.find(Locator::Css(INCREASE_BUTTON)).await,
            None => client.find(Locator::Css(INCREASE_BUTTON)).await,
        };
        match button {
            Ok(button) => button.click().await?,
            Err(e) => {
                ::log::warn!(
                    "Could not raise quantity past {} of {}: {}",
                    step,
                    quantity,
                    e
                );
                break;
            }
        }
    }
    Ok(())
}

/// Chrome capabilities for the session
fn capabilities(headless: bool) -> serde_json::Map<String, serde_json::Value> {
    let mut args = vec!["--window-size=1280,900", "--disable-gpu"];
    if headless {
        args.push("--headless=new");
    }

    let mut caps = serde_json::Map::new();
    caps.insert(
        "goog:chromeOptions".to_string(),
        serde_json::json!({ "args": args }),
    );
    caps
}

async fn connect(url: &str, headless: bool) -> Result<Client, fantoccini::error::NewSessionError> {
    let mut builder = ClientBuilder::native();
    builder.capabilities(capabilities(headless));
    builder.connect(url).await
}

/// Connects to the WebDriver instance
async fn connect_to_webdriver(webdriver_url: &str, headless: bool) -> Option<Client> {
    // Try to connect to the specified WebDriver URL
    match connect(webdriver_url, headless).await {
        Ok(client) => {
            ::log::debug!("Connected to WebDriver at {}", webdriver_url);
            return Some(client);
        }
        Err(e) => {
            ::log::error!(
                "Failed to connect to WebDriver at {}: {}",
                webdriver_url,
                e
            );
        }
    }

    // If we couldn't connect, try with common alternative URLs
    let fallback_urls = [
        "http://localhost:9515", // ChromeDriver default
        "http://localhost:4723", // Appium default
        "http://localhost:9222", // Chrome debug port default
        "http://127.0.0.1:4444", // Try with IP instead of localhost
    ];

    for url in fallback_urls.iter() {
        if *url == webdriver_url {
            continue;
        }

        ::log::info!("Trying fallback WebDriver URL: {}", url);
        if let Ok(client) = connect(url, headless).await {
            ::log::debug!("Connected to fallback WebDriver at {}", url);
            return Some(client);
        }
    }

    ::log::error!(
        "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
    );
    None
}

/// Navigate, give the page time to render, and read back its source
async fn load_page(
    client: &Client,
    url: &str,
    page_timeout: Duration,
    settle: Duration,
) -> Result<String, BoxError> {
    let page = timeout(page_timeout, async {
        client.goto(url).await?;
        tokio::time::sleep(settle).await;
        client.source().await
    })
    .await;

    match page {
        Ok(Ok(html)) => Ok(html),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(format!("Timeout loading {}", url).into()),
    }
}

fn is_session_lost_message(message: &str) -> bool {
    message.contains("Unable to find session") || message.contains("invalid session id")
}

fn is_session_lost(error: &BoxError) -> bool {
    is_session_lost_message(&error.to_string())
}

fn is_session_lost_cmd(error: &fantoccini::error::CmdError) -> bool {
    is_session_lost_message(&error.to_string())
}

/// Item ids are interpolated into CSS selectors
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// A cookie as exported by common browser extensions
#[derive(Debug, Deserialize)]
struct StoredCookie {
    name: String,
    value: String,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    secure: bool,
    #[serde(default, rename = "httpOnly")]
    http_only: bool,
}

impl StoredCookie {
    fn into_cookie(self) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.name, self.value);
        if let Some(domain) = self.domain {
            cookie.set_domain(domain);
        }
        cookie.set_path(self.path.unwrap_or_else(|| "/".to_string()));
        cookie.set_secure(self.secure);
        cookie.set_http_only(self.http_only);
        cookie
    }
}

fn read_cookies(path: &Path) -> Result<Vec<StoredCookie>, BoxError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Origin a cookie file belongs to, taken from its first domain
fn cookie_origin(cookies: &[StoredCookie]) -> Option<String> {
    cookies
        .iter()
        .find_map(|c| c.domain.as_deref())
        .map(|domain| format!("https://{}/", domain.trim_start_matches('.')))
}

/// Load every cookie file into the session. Cookies can only be set for the
/// current origin, so each file's site is visited first.
async fn load_cookies(client: &Client, files: &[PathBuf]) -> Result<usize, BoxError> {
    let mut loaded = 0;

    for file in files {
        let cookies = read_cookies(file)?;
        let Some(origin) = cookie_origin(&cookies) else {
            ::log::warn!("No cookie domain in {}, skipping", file.display());
            continue;
        };
        client.goto(&origin).await?;

        for stored in cookies {
            let name = stored.name.clone();
            match client.add_cookie(stored.into_cookie()).await {
                Ok(()) => loaded += 1,
                Err(e) => ::log::debug!("Rejected cookie {}: {}", name, e),
            }
        }
    }

    Ok(loaded)
}
