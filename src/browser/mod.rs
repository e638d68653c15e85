pub mod webdriver;

pub use webdriver::WebDriverSession;

use crate::BoxError;
use crate::candidate::MatchResult;

/// Something that can load a page and hand back its rendered HTML
#[allow(async_fn_in_trait)]
pub trait PageSource {
    /// Load `url` and return the page source
    async fn fetch(&mut self, url: &str) -> Result<String, BoxError>;
}

/// Something that can put a matched product into the retailer cart
#[allow(async_fn_in_trait)]
pub trait CartWriter {
    /// Add `quantity` of `item` to the cart.
    ///
    /// `Ok(false)` means the product could not be found on the page; `Err` is
    /// reserved for browser failures.
    async fn add_to_cart(&mut self, item: &MatchResult, quantity: u32) -> Result<bool, BoxError>;
}

/// Wraps a page source and logs cart additions instead of performing them
pub struct DryRun<S> {
    inner: S,
    planned: Vec<(MatchResult, u32)>,
}

impl<S> DryRun<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            planned: Vec::new(),
        }
    }

    /// Additions that would have been made
    pub fn planned(&self) -> &[(MatchResult, u32)] {
        &self.planned
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: PageSource> PageSource for DryRun<S> {
    async fn fetch(&mut self, url: &str) -> Result<String, BoxError> {
        self.inner.fetch(url).await
    }
}

impl<S> CartWriter for DryRun<S> {
    async fn add_to_cart(&mut self, item: &MatchResult, quantity: u32) -> Result<bool, BoxError> {
        ::log::info!(
            "[dry run] would add {} x '{}' ({}, score {})",
            quantity,
            item.name,
            item.id,
            item.score
        );
        self.planned.push((item.clone(), quantity));
        Ok(true)
    }
}
