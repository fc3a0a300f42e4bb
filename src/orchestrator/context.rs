use crate::adapter::{AdapterRegistry, FeedAdapter};
use crate::config::Config;
use crate::fetch::{build_http_client, BrowserBackend, HttpFetcher, TieredFetcher};
use crate::politeness::PolitenessLimiter;
use crate::retry::RetryPolicy;
use crate::robots::RobotsCache;
use crate::store::{ArticleStore, SecondaryStore};
use crate::triage::TriageEngine;
use crate::TidewaterError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Everything one ingestion run shares
///
/// Built once at run start and passed to the orchestrator and adapters;
/// nothing here is global. [`IngestContext::shutdown`] releases the
/// browser backend and drains the write queue.
pub struct IngestContext {
    config: Arc<Config>,
    config_hash: String,
    limiter: Arc<PolitenessLimiter>,
    http: Arc<HttpFetcher>,
    fetcher: Arc<TieredFetcher>,
    robots: Arc<RobotsCache>,
    store: Arc<ArticleStore>,
    triage: Option<Arc<TriageEngine>>,
    retry: RetryPolicy,
    shutdown: Arc<AtomicBool>,
}

impl IngestContext {
    /// Builds the context, opening the stores `config` describes
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(config: Config, config_hash: impl Into<String>) -> Result<Self, TidewaterError> {
        let store = ArticleStore::open(&config.store)?;
        Self::with_store(config, config_hash, store)
    }

    /// Builds the context around an explicit secondary store
    pub fn with_secondary(
        config: Config,
        config_hash: impl Into<String>,
        secondary: Option<Box<dyn SecondaryStore>>,
    ) -> Result<Self, TidewaterError> {
        let store = ArticleStore::open_with_secondary(&config.store, secondary)?;
        Self::with_store(config, config_hash, store)
    }

    fn with_store(
        config: Config,
        config_hash: impl Into<String>,
        store: ArticleStore,
    ) -> Result<Self, TidewaterError> {
        let client = build_http_client(&config.user_agent, &config.fetch)?;
        let limiter = Arc::new(PolitenessLimiter::new(&config.politeness));
        let http = Arc::new(HttpFetcher::new(
            client,
            Arc::clone(&limiter),
            Duration::from_millis(config.fetch.pre_request_jitter),
        ));
        let fetcher = Arc::new(TieredFetcher::new(Arc::clone(&http)));
        let robots = Arc::new(RobotsCache::new(
            Arc::clone(&http),
            config.user_agent.crawler_name.clone(),
        ));

        let triage = if config.triage.enabled {
            Some(Arc::new(TriageEngine::new(&config.triage)?))
        } else {
            None
        };

        Ok(Self {
            retry: RetryPolicy::from_config(&config.retry),
            config: Arc::new(config),
            config_hash: config_hash.into(),
            limiter,
            http,
            fetcher,
            robots,
            store: Arc::new(store),
            triage,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Adds a browser tier for blocked pages
    pub fn with_browser(mut self, backend: Arc<dyn BrowserBackend>) -> Self {
        self.fetcher = Arc::new(TieredFetcher::new(Arc::clone(&self.http)).with_browser(backend));
        self
    }

    /// Registry with a [`FeedAdapter`] for every configured source
    pub fn feed_registry(&self) -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        for source in &self.config.sources {
            let adapter = FeedAdapter::new(source.clone(), Arc::clone(&self.fetcher), self.retry.clone())
                .with_robots(Arc::clone(&self.robots));
            registry.register(Arc::new(adapter));
        }
        registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn limiter(&self) -> &Arc<PolitenessLimiter> {
        &self.limiter
    }

    pub fn fetcher(&self) -> &Arc<TieredFetcher> {
        &self.fetcher
    }

    pub fn robots(&self) -> &Arc<RobotsCache> {
        &self.robots
    }

    pub fn store(&self) -> &Arc<ArticleStore> {
        &self.store
    }

    pub fn triage(&self) -> Option<&Arc<TriageEngine>> {
        self.triage.as_ref()
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Sets the flag checked between fetches; returns true if it was
    /// already set
    pub fn request_shutdown(&self) -> bool {
        self.shutdown.swap(true, Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Releases the browser backend and drains the write queue
    pub async fn shutdown(&self) {
        self.fetcher.shutdown().await;
        self.store.shutdown().await;
        tracing::debug!("Ingest context shut down ({} hosts seen)", self.limiter.host_count());
    }
}
