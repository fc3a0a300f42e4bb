use crate::discovery::{fetch_document, DiscoveredLink, DiscoveryMethod, DiscoveryStrategy};
use crate::fetch::HttpFetcher;
use crate::retry::{IngestError, RetryPolicy};
use crate::url::{extract_host, resolve_link};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Anchor selector used when a listing has none configured
const DEFAULT_SELECTOR: &str = "a[href]";

/// Harvests article links from a listing page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - Elements matched by `selector` that carry an `href`
/// - Links on the listing's own host
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:`, `data:` and fragment-only links
/// - Anchors with a `download` attribute
/// - The listing page itself
/// - Paths not containing `path_contains`, when set
///
/// The anchor text becomes the link title. Returns an error only for an
/// invalid selector.
pub fn harvest_links(
    html: &str,
    base_url: &Url,
    selector: Option<&str>,
    path_contains: Option<&str>,
    source: &str,
) -> Result<Vec<DiscoveredLink>, IngestError> {
    let selector_text = selector.unwrap_or(DEFAULT_SELECTOR);
    let selector = Selector::parse(selector_text)
        .map_err(|e| IngestError::malformed(format!("bad selector '{}': {:?}", selector_text, e)))?;

    let document = Html::parse_document(html);
    let listing_host = extract_host(base_url);
    let listing_key = DiscoveredLink::new(base_url.to_string(), String::new(), DiscoveryMethod::Listing).key();

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        if element.value().attr("download").is_some() {
            continue;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(absolute) = resolve_link(href, base_url) else {
            continue;
        };

        if extract_host(&absolute) != listing_host {
            continue;
        }
        if let Some(fragment) = path_contains {
            if !absolute.path().contains(fragment) {
                continue;
            }
        }

        let Some(mut link) = DiscoveredLink::from_raw(absolute.as_str(), source, DiscoveryMethod::Listing) else {
            continue;
        };
        let key = link.key();
        if key == listing_key || !seen.insert(key) {
            continue;
        }

        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            link.title = Some(text);
        }
        links.push(link);
    }

    Ok(links)
}

/// Discovers links by harvesting one listing page
pub struct ListingStrategy {
    url: Url,
    selector: Option<String>,
    path_contains: Option<String>,
    http: Arc<HttpFetcher>,
    retry: RetryPolicy,
}

impl ListingStrategy {
    pub fn new(url: Url, http: Arc<HttpFetcher>, retry: RetryPolicy) -> Self {
        Self {
            url,
            selector: None,
            path_contains: None,
            http,
            retry,
        }
    }

    pub fn with_selector(mut self, selector: Option<String>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_path_filter(mut self, path_contains: Option<String>) -> Self {
        self.path_contains = path_contains;
        self
    }
}

#[async_trait]
impl DiscoveryStrategy for ListingStrategy {
    fn label(&self) -> String {
        format!("listing {}", self.url)
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::Listing
    }

    async fn discover(&self, source: &str) -> Result<Vec<DiscoveredLink>, IngestError> {
        let page = fetch_document(&self.http, &self.retry, &self.url).await?;
        let links = harvest_links(
            &page.text(),
            &page.url,
            self.selector.as_deref(),
            self.path_contains.as_deref(),
            source,
        )?;
        tracing::debug!("{} yielded {} links", self.label(), links.len());
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <nav><a href="/">Home</a><a href="/news/">News</a></nav>
          <div class="story"><a href="/news/2024/fda-approves"> FDA   approves </a></div>
          <div class="story"><a href="/news/2024/fda-approves/#comments">Comments</a></div>
          <div class="story"><a href="https://www.example.com/news/2024/markets">Markets</a></div>
          <a href="https://other.example.org/news/elsewhere">Elsewhere</a>
          <a href="/files/report.pdf" download>Report</a>
          <a href="mailto:desk@example.com">Mail</a>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://example.com/news/").unwrap()
    }

    #[test]
    fn test_harvest_with_path_filter() {
        let links = harvest_links(LISTING, &base(), None, Some("/news/2024/"), "wire").unwrap();
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/news/2024/fda-approves",
                "https://example.com/news/2024/markets"
            ]
        );
        assert_eq!(links[0].title.as_deref(), Some("FDA approves"));
    }

    #[test]
    fn test_harvest_with_selector() {
        let links = harvest_links(LISTING, &base(), Some("div.story a"), None, "wire").unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.method == DiscoveryMethod::Listing));
    }

    #[test]
    fn test_listing_page_itself_is_skipped() {
        let links = harvest_links(LISTING, &base(), None, None, "wire").unwrap();
        assert!(links.iter().all(|l| l.url != "https://example.com/news"));
        assert!(links.iter().any(|l| l.url == "https://example.com/"));
    }

    #[test]
    fn test_invalid_selector() {
        assert!(harvest_links(LISTING, &base(), Some("div[[["), None, "wire").is_err());
    }
}
