//! URL discovery
//!
//! This module contains:
//! - `DiscoveredLink`: a candidate article URL with optional metadata
//! - Discovery strategies: RSS/Atom feeds, sitemaps, listing pages
//! - The merger that unions strategy results by canonical key

mod listing;
mod merger;
mod rss;
mod sitemap;

pub use listing::{harvest_links, ListingStrategy};
pub use merger::{merge_strategies, MergeOutcome, MergedLinks};
pub use rss::{parse_feed, RssStrategy};
pub use sitemap::{parse_sitemap, SitemapDocument, SitemapStrategy};

use crate::fetch::{FetchedPage, HttpFetcher};
use crate::retry::{IngestError, RetryPolicy};
use crate::url::{canonical_key, normalize_url};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::fmt;
use url::Url;

/// Channel through which a link was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiscoveryMethod {
    Rss,
    Sitemap,
    Listing,
}

impl DiscoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rss => "rss",
            Self::Sitemap => "sitemap",
            Self::Listing => "listing",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "rss" => Some(Self::Rss),
            "sitemap" => Some(Self::Sitemap),
            "listing" => Some(Self::Listing),
            _ => None,
        }
    }
}

impl fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate article URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredLink {
    /// Normalized URL
    pub url: String,
    pub source: String,
    pub method: DiscoveryMethod,
    pub title: Option<String>,
    pub description: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub categories: Vec<String>,
    /// Sitemap `lastmod`
    pub last_modified: Option<DateTime<Utc>>,
    /// Sitemap `priority`
    pub priority_hint: Option<f32>,
    /// Sitemap `changefreq`
    pub change_frequency: Option<String>,
}

impl DiscoveredLink {
    pub fn new(url: String, source: String, method: DiscoveryMethod) -> Self {
        Self {
            url,
            source,
            method,
            title: None,
            description: None,
            published: None,
            author: None,
            categories: Vec::new(),
            last_modified: None,
            priority_hint: None,
            change_frequency: None,
        }
    }

    /// Builds a link from a raw URL, normalizing it
    ///
    /// Returns None for URLs that are not http(s) or cannot be parsed.
    pub fn from_raw(raw: &str, source: &str, method: DiscoveryMethod) -> Option<Self> {
        let url = normalize_url(raw).ok()?;
        Some(Self::new(url.to_string(), source.to_string(), method))
    }

    /// Canonical key shared by all spellings of the same URL
    pub fn key(&self) -> String {
        canonical_key(&self.url).unwrap_or_else(|_| self.url.clone())
    }

    /// Best known date: publication date, else sitemap lastmod
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.published.or(self.last_modified)
    }
}

/// One way of finding candidate links for a source
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    /// Label used in logs, e.g. `rss https://example.com/feed`
    fn label(&self) -> String;

    fn method(&self) -> DiscoveryMethod;

    /// Returns zero or more links; errors are isolated by the merger
    async fn discover(&self, source: &str) -> Result<Vec<DiscoveredLink>, IngestError>;
}

/// Fetches a discovery document under the shared retry policy
pub(crate) async fn fetch_document(
    http: &HttpFetcher,
    retry: &RetryPolicy,
    url: &Url,
) -> Result<FetchedPage, IngestError> {
    retry.retry(url.as_str(), |_| http.fetch(url)).await
}

/// Parses the date formats found in feeds and sitemaps
///
/// Accepts RFC 3339, RFC 2822, `YYYY-MM-DDThh:mm[:ss]` without offset
/// (taken as UTC) and bare `YYYY-MM-DD`.
pub fn parse_feed_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    // W3C datetime with minutes and an offset, e.g. 2024-05-01T10:00+02:00
    if let Ok(date) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%:z") {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Replaces HTML entities that are not defined in XML
pub(crate) fn scrub_html_entities(xml: &str) -> String {
    xml.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_normalizes() {
        let link = DiscoveredLink::from_raw(
            "https://www.example.com/a/?utm_source=x",
            "wire",
            DiscoveryMethod::Rss,
        )
        .unwrap();
        assert_eq!(link.url, "https://example.com/a");
        assert!(DiscoveredLink::from_raw("ftp://example.com/a", "wire", DiscoveryMethod::Rss).is_none());
    }

    #[test]
    fn test_parse_feed_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            .and_utc();

        assert_eq!(parse_feed_date("2024-05-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_feed_date("Wed, 01 May 2024 10:00:00 GMT"), Some(expected));
        assert_eq!(parse_feed_date("2024-05-01T12:00+02:00"), Some(expected));
        assert_eq!(parse_feed_date("2024-05-01T10:00:00"), Some(expected));
        assert!(parse_feed_date("2024-05-01").is_some());
        assert_eq!(parse_feed_date("yesterday"), None);
    }

    #[test]
    fn test_method_round_trip() {
        for method in [DiscoveryMethod::Rss, DiscoveryMethod::Sitemap, DiscoveryMethod::Listing] {
            assert_eq!(DiscoveryMethod::from_db_string(method.as_str()), Some(method));
        }
    }
}
