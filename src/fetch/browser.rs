use crate::fetch::{FetchedPage, HttpFetcher};
use crate::retry::IngestError;
use crate::url::extract_host;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// A pool of headless rendering sessions
///
/// Implementations wrap whatever browser automation is available. The
/// crate never constructs one itself; deployments that can afford a
/// browser pass one to [`TieredFetcher::with_browser`].
#[async_trait]
pub trait BrowserBackend: Send + Sync {
    /// Checks out a rendering session
    async fn acquire(&self) -> Result<Box<dyn BrowserSession>, IngestError>;

    /// Tears the backend down at the end of a run
    async fn shutdown(&self) {}
}

/// One checked-out rendering session
#[async_trait]
pub trait BrowserSession: Send {
    /// Loads a page and returns its rendered HTML
    async fn render(&mut self, url: &Url) -> Result<FetchedPage, IngestError>;

    /// Returns the session to its backend
    async fn release(self: Box<Self>);
}

/// Cheap HTTP first, browser only when blocking was classified
///
/// The browser tier is attempted only when the HTTP failure kind warrants
/// escalation (Forbidden, BotChallenge). A session acquired for a URL is
/// always released before the result is returned.
pub struct TieredFetcher {
    http: Arc<HttpFetcher>,
    browser: Option<Arc<dyn BrowserBackend>>,
}

impl TieredFetcher {
    pub fn new(http: Arc<HttpFetcher>) -> Self {
        Self { http, browser: None }
    }

    pub fn with_browser(mut self, backend: Arc<dyn BrowserBackend>) -> Self {
        self.browser = Some(backend);
        self
    }

    pub fn http(&self) -> &Arc<HttpFetcher> {
        &self.http
    }

    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, IngestError> {
        let error = match self.http.fetch(url).await {
            Ok(page) => return Ok(page),
            Err(e) => e,
        };

        let escalate = error.kind().is_some_and(|kind| kind.warrants_escalation());
        match (&self.browser, escalate) {
            (Some(backend), true) => {
                tracing::info!("Escalating {} to browser after {}", url, error);
                self.fetch_with_browser(backend.as_ref(), url).await
            }
            _ => Err(error),
        }
    }

    async fn fetch_with_browser(
        &self,
        backend: &dyn BrowserBackend,
        url: &Url,
    ) -> Result<FetchedPage, IngestError> {
        let host = extract_host(url)
            .ok_or_else(|| IngestError::malformed(format!("URL has no host: {}", url)))?;

        let limiter = self.http.limiter();
        let _permit = limiter.wait(&host).await;

        let mut session = backend.acquire().await?;
        let result = session.render(url).await;
        session.release().await;

        match &result {
            Ok(_) => limiter.record_success(&host),
            Err(e) if e.is_retryable() => limiter.record_failure(&host),
            Err(_) => {}
        }

        result
    }

    /// Shuts the browser backend down, if any
    pub async fn shutdown(&self) {
        if let Some(backend) = &self.browser {
            backend.shutdown().await;
        }
    }
}
