use crate::discovery::{
    fetch_document, parse_feed_date, scrub_html_entities, DiscoveredLink, DiscoveryMethod,
    DiscoveryStrategy,
};
use crate::fetch::HttpFetcher;
use crate::retry::{IngestError, RetryPolicy};
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

// ===== RSS 2.0 =====

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    author: Option<String>,
    /// `<dc:creator>`; elements are matched by local name
    creator: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<String>,
}

// ===== Atom =====

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    author: Option<AtomAuthor>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: Option<String>,
}

/// Parses an RSS 2.0 or Atom document into links
///
/// Items without a usable http(s) link are skipped. Relative links are
/// resolved against `base`.
pub fn parse_feed(xml: &str, source: &str, base: &Url) -> Result<Vec<DiscoveredLink>, IngestError> {
    let xml = scrub_html_entities(xml);

    if is_atom(&xml) {
        let feed: AtomFeed = from_str(&xml)
            .map_err(|e| IngestError::malformed(format!("Atom feed {}: {}", base, e)))?;
        return Ok(feed
            .entries
            .into_iter()
            .filter_map(|entry| atom_link(entry, source, base))
            .collect());
    }

    let rss: Rss =
        from_str(&xml).map_err(|e| IngestError::malformed(format!("RSS feed {}: {}", base, e)))?;
    Ok(rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| rss_link(item, source, base))
        .collect())
}

fn is_atom(xml: &str) -> bool {
    let head: String = xml.chars().take(1024).collect();
    head.contains("<feed") && !head.contains("<rss")
}

fn resolve(raw: &str, source: &str, base: &Url) -> Option<DiscoveredLink> {
    let absolute = base.join(raw.trim()).ok()?;
    DiscoveredLink::from_raw(absolute.as_str(), source, DiscoveryMethod::Rss)
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn rss_link(item: Item, source: &str, base: &Url) -> Option<DiscoveredLink> {
    let raw = clean(item.link).or_else(|| clean(item.guid).filter(|g| g.starts_with("http")))?;
    let mut link = resolve(&raw, source, base)?;

    link.title = clean(item.title);
    link.description = clean(item.description);
    link.published = item.pub_date.as_deref().and_then(parse_feed_date);
    link.author = clean(item.creator).or_else(|| clean(item.author));
    link.categories = item
        .categories
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    Some(link)
}

fn atom_link(entry: AtomEntry, source: &str, base: &Url) -> Option<DiscoveredLink> {
    let href = entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| entry.links.first())
        .and_then(|l| l.href.clone())?;
    let mut link = resolve(&href, source, base)?;

    link.title = clean(entry.title);
    link.description = clean(entry.summary);
    link.published = entry
        .published
        .as_deref()
        .or(entry.updated.as_deref())
        .and_then(parse_feed_date);
    link.author = entry.author.and_then(|a| clean(a.name));
    link.categories = entry
        .categories
        .into_iter()
        .filter_map(|c| clean(c.term))
        .collect();
    Some(link)
}

/// Discovers links from one RSS or Atom feed
pub struct RssStrategy {
    feed_url: Url,
    http: Arc<HttpFetcher>,
    retry: RetryPolicy,
}

impl RssStrategy {
    pub fn new(feed_url: Url, http: Arc<HttpFetcher>, retry: RetryPolicy) -> Self {
        Self {
            feed_url,
            http,
            retry,
        }
    }
}

#[async_trait]
impl DiscoveryStrategy for RssStrategy {
    fn label(&self) -> String {
        format!("rss {}", self.feed_url)
    }

    fn method(&self) -> DiscoveryMethod {
        DiscoveryMethod::Rss
    }

    async fn discover(&self, source: &str) -> Result<Vec<DiscoveredLink>, IngestError> {
        let page = fetch_document(&self.http, &self.retry, &self.feed_url).await?;
        let links = parse_feed(&page.text(), source, &page.url)?;
        tracing::debug!("{} yielded {} links", self.label(), links.len());
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://news.example.com/feed.xml").unwrap()
    }

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Example News</title>
    <item>
      <title>FDA approves new drug</title>
      <link>https://news.example.com/health/fda-approves/?utm_source=rss</link>
      <description><![CDATA[<p>The agency&nbsp;said...</p>]]></description>
      <pubDate>Wed, 01 May 2024 10:00:00 GMT</pubDate>
      <dc:creator>Jane Reporter</dc:creator>
      <category>Health</category>
      <category>Policy</category>
    </item>
    <item>
      <title>Relative link</title>
      <link>/markets/stocks-rally</link>
    </item>
    <item>
      <title>No link at all</title>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Atom</title>
  <entry>
    <title>Atom entry</title>
    <link rel="alternate" href="https://news.example.com/atom-entry"/>
    <link rel="edit" href="https://news.example.com/edit/1"/>
    <updated>2024-05-02T08:30:00Z</updated>
    <author><name>Sam Writer</name></author>
    <category term="Markets"/>
    <summary>Short summary</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_items() {
        let links = parse_feed(RSS, "wire", &base()).unwrap();
        assert_eq!(links.len(), 2);

        let first = &links[0];
        assert_eq!(first.url, "https://news.example.com/health/fda-approves");
        assert_eq!(first.title.as_deref(), Some("FDA approves new drug"));
        assert_eq!(first.author.as_deref(), Some("Jane Reporter"));
        assert_eq!(first.categories, vec!["Health", "Policy"]);
        assert!(first.published.is_some());
        assert_eq!(first.method, DiscoveryMethod::Rss);

        assert_eq!(links[1].url, "https://news.example.com/markets/stocks-rally");
    }

    #[test]
    fn test_parse_atom_entries() {
        let links = parse_feed(ATOM, "wire", &base()).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://news.example.com/atom-entry");
        assert_eq!(links[0].author.as_deref(), Some("Sam Writer"));
        assert_eq!(links[0].categories, vec!["Markets"]);
        assert!(links[0].published.is_some());
    }

    #[test]
    fn test_empty_channel() {
        let xml = "<rss version=\"2.0\"><channel><title>t</title></channel></rss>";
        assert!(parse_feed(xml, "wire", &base()).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_feed_is_terminal() {
        let err = parse_feed("<html><body>not a feed", "wire", &base()).unwrap_err();
        assert!(!err.is_retryable());
    }
}
