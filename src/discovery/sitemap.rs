use crate::discovery::{
    fetch_document, parse_feed_date, DiscoveredLink, DiscoveryMethod, DiscoveryStrategy,
};
use crate::fetch::HttpFetcher;
use crate::retry::{IngestError, RetryPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;
use url::Url;

/// Index nesting followed before giving up
pub const MAX_SITEMAP_DEPTH: usize = 3;

/// Gzip magic bytes
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Deserialize)]
struct UrlSet {
    #[serde(rename = "url", default)]
    urls: Vec<UrlEntry>,
}

#[derive(Debug, Deserialize)]
struct UrlEntry {
    loc: String,
    lastmod: Option<String>,
    priority: Option<String>,
    changefreq: Option<String>,
    /// `<news:news>`, with `<news:title>` and `<news:publication_date>`
    news: Option<NewsEntry>,
}

#[derive(Debug, Deserialize)]
struct NewsEntry {
    title: Option<String>,
    publication_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SitemapIndex {
    #[serde(rename = "sitemap", default)]
    sitemaps: Vec<SitemapRef>,
}

#[derive(Debug, Deserialize)]
struct SitemapRef {
    loc: String,
    lastmod: Option<String>,
}

/// A child sitemap referenced by an index
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSitemap {
    pub loc: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A parsed sitemap file
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    Index(Vec<ChildSitemap>),
    UrlSet(Vec<DiscoveredLink>),
}

/// Decodes a fetched sitemap body, gunzipping when needed
///
/// `.gz` sitemaps served with a gzip Content-Encoding arrive already
/// decompressed, so the magic bytes decide rather than the extension.
pub fn decode_body(body: &[u8], url: &Url) -> Result<String, IngestError> {
    if !body.starts_with(&GZIP_MAGIC) {
        return Ok(String::from_utf8_lossy(body).into_owned());
    }

    let mut xml = String::new();
    GzDecoder::new(body)
        .read_to_string(&mut xml)
        .map_err(|e| IngestError::malformed(format!("gzip sitemap {}: {}", url, e)))?;
    Ok(xml)
}

/// Parses a sitemap index or urlset
pub fn parse_sitemap(xml: &str, source: &str) -> Result<SitemapDocument, IngestError> {
    let head: String = xml.chars().take(2048).collect();

    if head.contains("<sitemapindex") {
        let index: SitemapIndex =
            from_str(xml).map_err(|e| IngestError::malformed(format!("sitemap index: {}", e)))?;
        let children = index
            .sitemaps
            .into_iter()
            .map(|s| ChildSitemap {
                loc: s.loc.trim().to_string(),
                last_modified: s.lastmod.as_deref().and_then(parse_feed_date),
            })
            .filter(|s| !s.loc.is_empty())
            .collect();
        return Ok(SitemapDocument::Index(children));
    }

    if !head.contains("<urlset") {
        return Err(IngestError::malformed("document is not a sitemap"));
    }

    let set: UrlSet =
        from_str(xml).map_err(|e| IngestError::malformed(format!("sitemap urlset: {}", e)))?;
    let links = set
        .urls
        .into_iter()
        .filter_map(|entry| {
            let mut link = DiscoveredLink::from_raw(entry.loc.trim(), source, DiscoveryMethod::Sitemap)?;
            link.last_modified = entry.lastmod.as_deref().and_then(parse_feed_date);
            link.priority_hint = entry
                .priority
                .as_deref()
                .and_then(|p| p.trim().parse::<f32>().ok())
                .filter(|p| (0.0..=1.0).contains(p));
            link.change_frequency = entry
                .changefreq
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty());
            if let Some(news) = entry.news {
                link.title = news.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
                link.published = news.publication_date.as_deref().and_then(parse_feed_date);
            }
            Some(link)
        })
        .collect();
    Ok(SitemapDocument::UrlSet(links))
}

/// Discovers links from sitemaps, expanding indexes recursively
///
/// Child sitemaps are followed up to [`MAX_SITEMAP_DEPTH`] levels and each
/// sitemap URL is fetched at most once. A failing child is logged and
/// skipped; only a failure of every root fails the strategy. With a
/// retention horizon, entries and child sitemaps whose lastmod is older
/// are dropped.
pub struct SitemapStrategy {
    roots: Vec<Url>,
    http: Arc<HttpFetcher>,
    retry: RetryPolicy,
    retention: Option<chrono::Duration>,
}

impl SitemapStrategy {
    pub fn new(roots: Vec<Url>, http: Arc<HttpFetcher>, retry: RetryPolicy) -> Self {
        Self {
            roots,
            http,
            retry,
            retention: None,
        }
    }

    pub fn with_retention_days(mut self, days: Option<u32>) -> Self {
        self.retention = days.map(|d| chrono::Duration::days(i64::from(d)));
        self
    }

    fn horizon(&self) -> Option<DateTime<Utc>> {
        self.retention.map(|r| Utc::now() - r)
    }

    async fn fetch_sitemap(&self, url: &Url, source: &str) -> Result<SitemapDocument, IngestError> {
        let page = fetch_document(&self.http, &self.retry, url).await?;
        let xml = decode_body(&page.body, url)?;
        parse_sitemap(&xml, source)
    }
}

#[async_trait]
impl DiscoveryStrategy for SitemapStrategy {
    fn label(&self) -> String {
        let roots: Vec<&str> = self.roots.iter().map(Url::as_str).collect();
        format!("sitemap {}", roots.join(", "))
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::Sitemap
    }

    async fn discover(&self, source: &str) -> Result<Vec<DiscoveredLink>, IngestError> {
        let horizon = self.horizon();
        let mut visited: HashSet<String> = HashSet::new();
        let mut pending: Vec<(Url, usize)> = self.roots.iter().rev().map(|u| (u.clone(), 0)).collect();
        let mut links = Vec::new();
        let mut root_errors = Vec::new();

        while let Some((url, depth)) = pending.pop() {
            if !visited.insert(url.to_string()) {
                continue;
            }

            let document = match self.fetch_sitemap(&url, source).await {
                Ok(document) => document,
                Err(e) if depth == 0 => {
                    tracing::warn!("Sitemap {} failed: {}", url, e);
                    root_errors.push(e);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Child sitemap {} skipped: {}", url, e);
                    continue;
                }
            };

            match document {
                SitemapDocument::UrlSet(entries) => {
                    let before = entries.len();
                    let kept: Vec<DiscoveredLink> = entries
                        .into_iter()
                        .filter(|link| within_horizon(link.date(), horizon))
                        .collect();
                    tracing::debug!(
                        "Sitemap {} yielded {} links ({} outside retention)",
                        url,
                        kept.len(),
                        before - kept.len()
                    );
                    links.extend(kept);
                }
                SitemapDocument::Index(children) => {
                    if depth >= MAX_SITEMAP_DEPTH {
                        tracing::warn!("Sitemap index {} exceeds depth {}", url, MAX_SITEMAP_DEPTH);
                        continue;
                    }
                    for child in children.into_iter().rev() {
                        if !within_horizon(child.last_modified, horizon) {
                            continue;
                        }
                        match url.join(&child.loc) {
                            Ok(child_url) => pending.push((child_url, depth + 1)),
                            Err(e) => tracing::debug!("Bad child sitemap {}: {}", child.loc, e),
                        }
                    }
                }
            }
        }

        if !self.roots.is_empty() && root_errors.len() == self.roots.len() {
            return Err(root_errors.remove(0));
        }
        Ok(links)
    }
}

fn within_horizon(date: Option<DateTime<Utc>>, horizon: Option<DateTime<Utc>>) -> bool {
    match (date, horizon) {
        (Some(date), Some(horizon)) => date >= horizon,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/sitemap-1.xml</loc><lastmod>2024-05-01</lastmod></sitemap>
  <sitemap><loc>https://example.com/sitemap-2.xml.gz</loc></sitemap>
</sitemapindex>"#;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
        xmlns:news="http://www.google.com/schemas/sitemap-news/0.9">
  <url>
    <loc>https://example.com/news/a/</loc>
    <lastmod>2024-05-01T10:00:00+00:00</lastmod>
    <changefreq>Daily</changefreq>
    <priority>0.8</priority>
  </url>
  <url>
    <loc>https://example.com/news/b</loc>
    <news:news>
      <news:title>Headline B</news:title>
      <news:publication_date>2024-05-02</news:publication_date>
    </news:news>
  </url>
</urlset>"#;

    #[test]
    fn test_parse_index() {
        match parse_sitemap(INDEX, "wire").unwrap() {
            SitemapDocument::Index(children) => {
                assert_eq!(children.len(), 2);
                assert!(children[0].last_modified.is_some());
                assert_eq!(children[1].loc, "https://example.com/sitemap-2.xml.gz");
            }
            other => panic!("expected index, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_urlset_hints() {
        let SitemapDocument::UrlSet(links) = parse_sitemap(URLSET, "wire").unwrap() else {
            panic!("expected urlset");
        };
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://example.com/news/a");
        assert_eq!(links[0].priority_hint, Some(0.8));
        assert_eq!(links[0].change_frequency.as_deref(), Some("daily"));
        assert!(links[0].last_modified.is_some());
        assert_eq!(links[1].title.as_deref(), Some("Headline B"));
        assert!(links[1].published.is_some());
    }

    #[test]
    fn test_gzip_body_is_decoded() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(URLSET.as_bytes()).unwrap();
        let body = encoder.finish().unwrap();

        let url = Url::parse("https://example.com/sitemap.xml.gz").unwrap();
        assert_eq!(decode_body(&body, &url).unwrap(), URLSET);

        let plain = Url::parse("https://example.com/sitemap.xml").unwrap();
        assert_eq!(decode_body(&body, &plain).unwrap(), URLSET);
    }

    #[test]
    fn test_already_decompressed_gz_url() {
        let url = Url::parse("https://example.com/sitemap.xml.gz").unwrap();
        assert_eq!(decode_body(URLSET.as_bytes(), &url).unwrap(), URLSET);
    }

    #[test]
    fn test_not_a_sitemap() {
        assert!(parse_sitemap("<html></html>", "wire").is_err());
    }

    #[test]
    fn test_within_horizon() {
        let now = Utc::now();
        let horizon = Some(now - chrono::Duration::days(7));
        assert!(within_horizon(None, horizon));
        assert!(within_horizon(Some(now), horizon));
        assert!(!within_horizon(Some(now - chrono::Duration::days(30)), horizon));
        assert!(within_horizon(Some(now - chrono::Duration::days(30)), None));
    }
}
