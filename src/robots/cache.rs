//! Per-origin robots.txt cache

use crate::fetch::HttpFetcher;
use crate::retry::ErrorKind;
use crate::robots::RobotsRules;
use crate::url::extract_host;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

/// Crawl-delay values above this are clamped (seconds)
const MAX_CRAWL_DELAY: f64 = 300.0;

/// Robots rules with the time they were fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub rules: Arc<RobotsRules>,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(rules: RobotsRules) -> Self {
        Self {
            rules: Arc::new(rules),
            fetched_at: Utc::now(),
        }
    }

    /// Robots files are refreshed daily
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Fetches robots.txt once per origin and answers permission queries
///
/// Fetches go through the politeness limiter like any other request. A
/// missing or unreachable robots.txt allows everything. A Crawl-delay
/// longer than the host's configured spacing raises that spacing.
pub struct RobotsCache {
    http: Arc<HttpFetcher>,
    user_agent: String,
    entries: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    /// # Arguments
    ///
    /// * `http` - Fetcher used for robots.txt requests
    /// * `user_agent` - Product token matched against User-agent groups
    pub fn new(http: Arc<HttpFetcher>, user_agent: impl Into<String>) -> Self {
        Self {
            http,
            user_agent: user_agent.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Rules for the origin of `url`
    pub async fn rules_for(&self, url: &Url) -> Arc<RobotsRules> {
        let origin = url.origin().ascii_serialization();

        // Held across the fetch so one origin is never fetched twice
        let mut entries = self.entries.lock().await;
        if let Some(cached) = entries.get(&origin) {
            if !cached.is_stale() {
                return Arc::clone(&cached.rules);
            }
        }

        let rules = self.fetch_rules(url).await;
        if let (Some(host), Some(delay)) = (extract_host(url), rules.crawl_delay(&self.user_agent)) {
            self.http
                .limiter()
                .raise_min_delay(&host, std::time::Duration::from_secs_f64(delay.min(MAX_CRAWL_DELAY)));
        }

        let cached = CachedRobots::new(rules);
        let rules = Arc::clone(&cached.rules);
        entries.insert(origin, cached);
        rules
    }

    /// Whether the crawler may fetch `url`
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let allowed = self.rules_for(url).await.is_allowed(url.as_str(), &self.user_agent);
        if !allowed {
            tracing::debug!("robots.txt disallows {}", url);
        }
        allowed
    }

    /// Sitemap URLs declared by the origin of `url`
    pub async fn sitemaps_for(&self, url: &Url) -> Vec<String> {
        self.rules_for(url).await.sitemaps()
    }

    async fn fetch_rules(&self, url: &Url) -> RobotsRules {
        let robots_url = match url.join("/robots.txt") {
            Ok(robots_url) => robots_url,
            Err(_) => return RobotsRules::allow_all(),
        };

        match self.http.fetch(&robots_url).await {
            Ok(page) => {
                tracing::debug!("Fetched {}", robots_url);
                RobotsRules::from_content(&page.text())
            }
            Err(e) if e.kind() == Some(ErrorKind::NotFound) => RobotsRules::allow_all(),
            Err(e) => {
                tracing::warn!("Could not fetch {}: {}; allowing all", robots_url, e);
                RobotsRules::allow_all()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cache_not_stale() {
        let cached = CachedRobots::new(RobotsRules::allow_all());
        assert!(!cached.is_stale());
    }

    #[test]
    fn test_cache_is_stale_after_a_day() {
        let mut cached = CachedRobots::new(RobotsRules::allow_all());
        cached.fetched_at = Utc::now() - Duration::hours(25);
        assert!(cached.is_stale());

        cached.fetched_at = Utc::now() - Duration::hours(23);
        assert!(!cached.is_stale());
    }
}
