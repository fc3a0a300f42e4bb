//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tidewater::config::{parse_config, Config, PolitenessConfig};
use tidewater::fetch::HttpFetcher;
use tidewater::politeness::PolitenessLimiter;
use tidewater::ArticleRecord;

/// Builds a validated config with fast pacing for tests
///
/// `extra` is appended verbatim, so it can carry `[triage]` and
/// `[[source]]` sections.
pub fn test_config(data_dir: &Path, extra: &str) -> Config {
    let toml = format!(
        r#"
[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[fetch]
timeout-secs = 5
connect-timeout-secs = 2
pre-request-jitter = 0

[politeness]
delay-between-requests = 0
delay-jitter = 0
max-concurrent = 4

[retry]
max-retries = 2
base-delay = 10

[store]
data-dir = "{}"
min-extract-length = 20
flush-batch-size = 2

{}
"#,
        data_dir.display().to_string().replace('\\', "/"),
        extra
    );
    parse_config(&toml).expect("test config should be valid")
}

/// An HTTP fetcher without pacing
pub fn fast_fetcher() -> Arc<HttpFetcher> {
    let politeness = PolitenessConfig {
        delay_between_requests: 0,
        delay_jitter: 0,
        max_concurrent: 4,
        ..PolitenessConfig::default()
    };
    let limiter = Arc::new(PolitenessLimiter::new(&politeness));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("client");
    Arc::new(HttpFetcher::new(client, limiter, Duration::ZERO))
}

/// A record long enough to pass validation
pub fn article(source: &str, link: &str) -> ArticleRecord {
    ArticleRecord::new(source, link)
        .with_title(format!("Headline for {}", link))
        .with_date("2024-05-01")
        .with_author("Desk")
        .with_extract("A body that is comfortably longer than the minimum length.")
}

/// An article page with a title and two paragraphs
pub fn article_page(title: &str) -> String {
    format!(
        r#"<html><head><title>{title}</title>
        <meta property="og:title" content="{title}">
        <meta property="article:published_time" content="2024-05-01T09:00:00Z">
        <meta name="author" content="Desk Reporter">
        </head><body><article>
        <p>{title} was reported today by several outlets.</p>
        <p>Officials said more details would follow later this week.</p>
        </article></body></html>"#
    )
}

/// An RSS feed whose items point at `paths` on `base`
pub fn rss_feed(base: &str, items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(path, title)| {
            format!(
                "<item><title>{title}</title><link>{base}{path}</link>\
                 <pubDate>Wed, 01 May 2024 10:00:00 GMT</pubDate></item>"
            )
        })
        .collect();
    format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Test</title>{items}</channel></rss>"#)
}
