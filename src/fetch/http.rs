use crate::config::{FetchConfig, UserAgentConfig};
use crate::politeness::PolitenessLimiter;
use crate::retry::{classify, detect_challenge, ErrorKind, FailureSignal, IngestError};
use crate::url::extract_host;
use rand::Rng;
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Successful responses larger than this are not scanned for challenge markers
const CHALLENGE_SCAN_LIMIT: usize = 32 * 1024;

/// A fetched document
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: Url,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value
    pub content_type: Option<String>,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use tidewater::config::{FetchConfig, UserAgentConfig};
/// use tidewater::fetch::build_http_client;
///
/// let ua = UserAgentConfig {
///     crawler_name: "Tidewater".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&ua, &FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    fetch: &FetchConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(fetch.timeout_secs))
        .connect_timeout(Duration::from_secs(fetch.connect_timeout_secs))
        .redirect(Policy::limited(10))
        .https_only(fetch.https_only)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues single HTTP requests under the politeness limiter
///
/// Every call waits for the host's next slot, then sleeps a random
/// pre-request jitter, then sends one GET. Failures come back classified;
/// retrying is the caller's business.
pub struct HttpFetcher {
    client: Client,
    limiter: Arc<PolitenessLimiter>,
    pre_request_jitter: Duration,
}

impl HttpFetcher {
    pub fn new(client: Client, limiter: Arc<PolitenessLimiter>, pre_request_jitter: Duration) -> Self {
        Self {
            client,
            limiter,
            pre_request_jitter,
        }
    }

    pub fn limiter(&self) -> &Arc<PolitenessLimiter> {
        &self.limiter
    }

    /// Fetches a URL under the host's pacing
    ///
    /// # Returns
    ///
    /// * `Ok(FetchedPage)` - 2xx response without challenge markers
    /// * `Err(IngestError::Retryable)` - transient failure (429, 403, timeout, 5xx, challenge)
    /// * `Err(IngestError::Terminal)` - 404/410 or a URL without host
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, IngestError> {
        let host = extract_host(url)
            .ok_or_else(|| IngestError::malformed(format!("URL has no host: {}", url)))?;

        let _permit = self.limiter.wait(&host).await;
        self.sleep_jitter().await;

        tracing::debug!("GET {}", url);
        let result = self.fetch_once(url).await;

        match &result {
            Ok(_) => self.limiter.record_success(&host),
            Err(e) if e.is_retryable() => self.limiter.record_failure(&host),
            Err(_) => {}
        }

        result
    }

    async fn fetch_once(&self, url: &Url) -> Result<FetchedPage, IngestError> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            let kind = classify(FailureSignal::Transport(&e));
            IngestError::from_kind(kind, format!("{}: {}", url, e))
        })?;

        let status = response.status();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| {
            let kind = classify(FailureSignal::Transport(&e));
            IngestError::from_kind(kind, format!("{}: reading body: {}", url, e))
        })?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            let kind = classify(FailureSignal::Status {
                code: status.as_u16(),
                body: &text,
            });
            return Err(IngestError::from_kind(
                kind,
                format!("HTTP {} from {}", status.as_u16(), url),
            ));
        }

        if body.len() <= CHALLENGE_SCAN_LIMIT && detect_challenge(&String::from_utf8_lossy(&body)) {
            return Err(IngestError::from_kind(
                ErrorKind::BotChallenge,
                format!("challenge page served for {}", url),
            ));
        }

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            content_type,
            body: body.to_vec(),
        })
    }

    async fn sleep_jitter(&self) {
        let max_ms = self.pre_request_jitter.as_millis() as u64;
        if max_ms > 0 {
            let ms = rand::rng().random_range(0..=max_ms);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}
