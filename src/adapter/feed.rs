use crate::adapter::{extract_article, is_html, DiscoveryScope, SourceAdapter};
use crate::config::SourceConfig;
use crate::discovery::{
    merge_strategies, DiscoveredLink, DiscoveryStrategy, ListingStrategy, MergedLinks,
    RssStrategy, SitemapStrategy,
};
use crate::fetch::TieredFetcher;
use crate::retry::{IngestError, RetryPolicy};
use crate::robots::RobotsCache;
use crate::store::ArticleRecord;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Adapter for a source described entirely by its `[[source]]` section
///
/// Discovery runs the configured feeds, sitemaps (plus any the site's
/// robots.txt declares, when enabled) and listing pages through the
/// merger, in that order. Extraction uses the generic metadata and
/// `<article>` heuristics.
pub struct FeedAdapter {
    source: SourceConfig,
    fetcher: Arc<TieredFetcher>,
    robots: Option<Arc<RobotsCache>>,
    retry: RetryPolicy,
}

impl FeedAdapter {
    pub fn new(source: SourceConfig, fetcher: Arc<TieredFetcher>, retry: RetryPolicy) -> Self {
        Self {
            source,
            fetcher,
            robots: None,
            retry,
        }
    }

    /// Enables robots.txt sitemap hints for sources that ask for them
    pub fn with_robots(mut self, robots: Arc<RobotsCache>) -> Self {
        self.robots = Some(robots);
        self
    }

    pub fn config(&self) -> &SourceConfig {
        &self.source
    }

    /// Builds the strategies for one discovery pass
    pub async fn strategies(&self, scope: DiscoveryScope) -> Vec<Box<dyn DiscoveryStrategy>> {
        let http = Arc::clone(self.fetcher.http());
        let mut strategies: Vec<Box<dyn DiscoveryStrategy>> = Vec::new();

        for feed in self.parse_urls(&self.source.rss) {
            strategies.push(Box::new(RssStrategy::new(feed, Arc::clone(&http), self.retry.clone())));
        }

        if scope == DiscoveryScope::FeedsOnly {
            if !strategies.is_empty() {
                return strategies;
            }
            tracing::debug!("[{}] no feeds configured, using every channel", self.source.name);
        }

        let mut roots = self.parse_urls(&self.source.sitemaps);
        for hinted in self.robots_sitemaps().await {
            if !roots.contains(&hinted) {
                roots.push(hinted);
            }
        }
        if !roots.is_empty() {
            strategies.push(Box::new(
                SitemapStrategy::new(roots, Arc::clone(&http), self.retry.clone())
                    .with_retention_days(self.source.retention_days),
            ));
        }

        for listing in &self.source.listings {
            let Some(url) = self.parse_url(&listing.url) else {
                continue;
            };
            strategies.push(Box::new(
                ListingStrategy::new(url, Arc::clone(&http), self.retry.clone())
                    .with_selector(listing.selector.clone())
                    .with_path_filter(listing.path_contains.clone()),
            ));
        }

        strategies
    }

    /// Sitemaps declared in robots.txt of the source's first configured origin
    async fn robots_sitemaps(&self) -> Vec<Url> {
        let Some(robots) = self.robots.as_ref().filter(|_| self.source.robots_sitemaps) else {
            return Vec::new();
        };

        let first = self
            .source
            .rss
            .iter()
            .chain(&self.source.sitemaps)
            .chain(self.source.listings.iter().map(|l| &l.url))
            .find_map(|raw| Url::parse(raw).ok());
        let Some(origin) = first else {
            return Vec::new();
        };

        let hinted = self.parse_urls(&robots.sitemaps_for(&origin).await);
        if !hinted.is_empty() {
            tracing::debug!(
                "[{}] robots.txt declares {} sitemaps",
                self.source.name,
                hinted.len()
            );
        }
        hinted
    }

    fn parse_urls(&self, raw: &[String]) -> Vec<Url> {
        raw.iter().filter_map(|r| self.parse_url(r)).collect()
    }

    fn parse_url(&self, raw: &str) -> Option<Url> {
        match Url::parse(raw.trim()) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!("[{}] skipping bad URL {}: {}", self.source.name, raw, e);
                None
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn name(&self) -> &str {
        &self.source.name
    }

    async fn discover(&self, scope: DiscoveryScope) -> MergedLinks {
        let strategies = self.strategies(scope).await;
        merge_strategies(&self.source.name, &strategies).await
    }

    async fn extract(&self, link: &DiscoveredLink) -> Result<ArticleRecord, IngestError> {
        let url = Url::parse(&link.url)
            .map_err(|e| IngestError::malformed(format!("{}: {}", link.url, e)))?;
        let page = self.fetcher.fetch(&url).await?;

        if !is_html(page.content_type.as_deref()) {
            return Err(IngestError::malformed(format!(
                "{} is not an HTML page ({})",
                link.url,
                page.content_type.as_deref().unwrap_or("unknown type")
            )));
        }

        Ok(extract_article(&page.text(), &self.source.name, link))
    }
}
