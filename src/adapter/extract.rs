//! Generic article extraction
//!
//! Works from standard metadata (OpenGraph, `article:*` meta tags,
//! `<time datetime>`) and the paragraphs of the `<article>` element,
//! falling back to whatever discovery already learned about the link.

use crate::discovery::{parse_feed_date, DiscoveredLink};
use crate::store::ArticleRecord;
use scraper::{ElementRef, Html, Selector};

const TITLE_META: &[&str] = &[
    r#"meta[property="og:title"]"#,
    r#"meta[name="twitter:title"]"#,
];

const DATE_META: &[&str] = &[
    r#"meta[property="article:published_time"]"#,
    r#"meta[name="pubdate"]"#,
    r#"meta[name="date"]"#,
    r#"meta[itemprop="datePublished"]"#,
];

const AUTHOR_META: &[&str] = &[
    r#"meta[name="author"]"#,
    r#"meta[property="article:author"]"#,
];

const DESCRIPTION_META: &[&str] = &[
    r#"meta[property="og:description"]"#,
    r#"meta[name="description"]"#,
];

/// Containers searched for body paragraphs, most specific first
const BODY_CONTAINERS: &[&str] = &["article", "main", "body"];

/// Whether a Content-Type denotes an HTML document
///
/// A missing header is given the benefit of the doubt.
pub fn is_html(content_type: Option<&str>) -> bool {
    match content_type {
        Some(value) => {
            let value = value.to_ascii_lowercase();
            value.contains("html") || value.contains("xml")
        }
        None => true,
    }
}

/// Builds a record from an article page
///
/// Page metadata wins over discovery metadata; the link is always the
/// discovered (normalized) URL so redirects do not change identity. The
/// record is not validated here.
pub fn extract_article(html: &str, source: &str, link: &DiscoveredLink) -> ArticleRecord {
    let document = Html::parse_document(html);

    let title = first_meta(&document, TITLE_META)
        .or_else(|| first_text(&document, "h1"))
        .or_else(|| first_text(&document, "title"))
        .or_else(|| link.title.clone())
        .unwrap_or_default();

    let date = first_meta(&document, DATE_META)
        .or_else(|| first_attr(&document, "time[datetime]", "datetime"))
        .map(|raw| normalize_date(&raw))
        .or_else(|| link.date().map(|d| d.format("%Y-%m-%d").to_string()))
        .unwrap_or_default();

    let author = first_meta(&document, AUTHOR_META)
        .or_else(|| first_text(&document, r#"[rel="author"]"#))
        .or_else(|| link.author.clone())
        .unwrap_or_default();

    let body = body_text(&document);
    let extract = if body.is_empty() {
        first_meta(&document, DESCRIPTION_META)
            .or_else(|| link.description.clone())
            .unwrap_or_default()
    } else {
        body
    };

    ArticleRecord::new(source, link.url.clone())
        .with_title(title)
        .with_date(date)
        .with_author(author)
        .with_extract(extract)
}

fn normalize_date(raw: &str) -> String {
    parse_feed_date(raw)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse(&element.text().collect::<Vec<_>>().join(" "))
}

fn first_meta(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .find_map(|selector| first_attr(document, selector, "content"))
}

fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|e| e.value().attr(attr))
        .map(collapse)
        .find(|v| !v.is_empty())
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .map(element_text)
        .find(|t| !t.is_empty())
}

/// Paragraph text of the most specific container that has any
fn body_text(document: &Html) -> String {
    let Ok(paragraph) = Selector::parse("p") else {
        return String::new();
    };

    for container in BODY_CONTAINERS {
        let Ok(selector) = Selector::parse(container) else {
            continue;
        };
        let Some(root) = document.select(&selector).next() else {
            continue;
        };
        let paragraphs: Vec<String> = root
            .select(&paragraph)
            .map(element_text)
            .filter(|p| !p.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            return paragraphs.join("\n\n");
        }
    }
    String::new()
}
