//! Pagination-driven fetch/parse/store loop.
//!
//! The loop is written once against [`CrawlStrategy`]; each kind of crawl
//! supplies its own fetch, parse and store steps.

mod likes;

pub use likes::{parse_liked_page, LikesCrawler};

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

/// What the store step decided about a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// New data was stored; later pages may hold more.
    Continue,
    /// The page was empty or already known; nothing was stored.
    Finished,
}

/// A fetched page reduced to storable items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPage<T> {
    pub next_token: Option<String>,
    pub items: Vec<T>,
}

/// One kind of paginated crawl.
#[async_trait]
pub trait CrawlStrategy: Send + Sync {
    type Fetched: Send;
    type Item: Send + Sync;

    /// Fetch the page at `pagination_token` (`None` for the first page).
    async fn fetch(&self, pagination_token: Option<&str>) -> Result<Self::Fetched>;

    /// Turn a fetched page into items plus the next pagination token.
    fn parse(&self, fetched: Self::Fetched) -> Result<ParsedPage<Self::Item>>;

    /// Persist a page of items.
    async fn store(&self, items: &[Self::Item]) -> Result<StoreOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    /// Drain every page until the API reports no more.
    Batch,
    /// Stop at the first page that holds nothing new.
    Incremental,
}

/// Why a crawl ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStop {
    /// The API returned no further pagination token.
    Exhausted,
    /// A page was empty or started with an already-stored item.
    ReachedKnown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Pages fetched.
    pub pages: usize,
    /// Pages whose store step returned [`StoreOutcome::Continue`].
    pub stored_pages: usize,
    pub stop: CrawlStop,
}

/// Sleep for the fixed inter-request interval.
pub async fn politeness_delay(interval: Duration) {
    if !interval.is_zero() {
        tokio::time::sleep(interval).await;
    }
}

/// Drives a [`CrawlStrategy`] through its pages.
pub struct Crawler<S> {
    strategy: S,
    request_interval: Duration,
}

impl<S: CrawlStrategy> Crawler<S> {
    #[must_use]
    pub fn new(strategy: S, request_interval: Duration) -> Self {
        Self {
            strategy,
            request_interval,
        }
    }

    #[must_use]
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Crawl until the API runs out of pages.
    ///
    /// # Errors
    ///
    /// Returns the first fetch, parse or store error; pages stored before
    /// it stay stored.
    pub async fn run_batch(&self) -> Result<CrawlSummary> {
        info!("Start batch crawling");
        let summary = self.run(CrawlMode::Batch).await?;
        info!(pages = summary.pages, stored_pages = summary.stored_pages, "Finished batch crawling");
        Ok(summary)
    }

    /// Crawl until a page holds nothing new, or the API runs out of pages.
    ///
    /// # Errors
    ///
    /// Returns the first fetch, parse or store error; pages stored before
    /// it stay stored.
    pub async fn run_incremental(&self) -> Result<CrawlSummary> {
        info!("Start incremental crawling");
        let summary = self.run(CrawlMode::Incremental).await?;
        info!(
            pages = summary.pages,
            stored_pages = summary.stored_pages,
            stop = ?summary.stop,
            "Finished incremental crawling"
        );
        Ok(summary)
    }

    /// Run the page loop in the given mode.
    ///
    /// # Errors
    ///
    /// Propagates any error from the strategy.
    pub async fn run(&self, mode: CrawlMode) -> Result<CrawlSummary> {
        let mut token: Option<String> = None;
        let mut pages = 0;
        let mut stored_pages = 0;

        loop {
            let (next_token, outcome) = self.crawl_page(token.as_deref()).await?;
            pages += 1;
            if outcome == StoreOutcome::Continue {
                stored_pages += 1;
            }

            if mode == CrawlMode::Incremental && outcome == StoreOutcome::Finished {
                return Ok(CrawlSummary {
                    pages,
                    stored_pages,
                    stop: CrawlStop::ReachedKnown,
                });
            }

            match next_token {
                Some(next) => token = Some(next),
                None => {
                    return Ok(CrawlSummary {
                        pages,
                        stored_pages,
                        stop: CrawlStop::Exhausted,
                    })
                }
            }
        }
    }

    /// One cycle: pause, fetch, parse, store.
    async fn crawl_page(
        &self,
        pagination_token: Option<&str>,
    ) -> Result<(Option<String>, StoreOutcome)> {
        politeness_delay(self.request_interval).await;

        let fetched = self.strategy.fetch(pagination_token).await?;
        let parsed = self.strategy.parse(fetched)?;
        info!(next_token = ?parsed.next_token, items = parsed.items.len(), "Fetched page");

        let outcome = self.strategy.store(&parsed.items).await?;
        debug!(?outcome, "Stored page");

        Ok((parsed.next_token, outcome))
    }
}
