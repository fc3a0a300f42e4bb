use serde::Deserialize;

/// Main configuration structure for Tidewater
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub triage: TriageConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Looks up a source section by name
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// HTTP fetch behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Upper bound of the random delay inserted before each request (ms)
    pub pre_request_jitter: u64,
    /// Refuse plain HTTP targets
    pub https_only: bool,
    /// Skip article URLs disallowed by robots.txt
    pub respect_robots: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            pre_request_jitter: 500,
            https_only: false,
            respect_robots: true,
        }
    }
}

/// Default per-host pacing, with optional overrides per host pattern
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PolitenessConfig {
    /// Minimum spacing between requests to one host (ms)
    pub delay_between_requests: u64,
    /// Random additive spacing (ms)
    pub delay_jitter: u64,
    /// In-flight requests allowed per host
    pub max_concurrent: u32,
    /// Requests per batch before a cooldown; 0 disables batching
    pub batch_size: u32,
    /// Cooldown after each batch (ms)
    pub pause_between_batches: u64,
    /// Per-host overrides, first match wins
    pub host: Vec<HostOverride>,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            delay_between_requests: 2000,
            delay_jitter: 1000,
            max_concurrent: 1,
            batch_size: 0,
            pause_between_batches: 30_000,
            host: Vec::new(),
        }
    }
}

/// Pacing override for hosts matching `host` (`*.example.com` allowed)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostOverride {
    pub host: String,
    pub delay_between_requests: Option<u64>,
    pub delay_jitter: Option<u64>,
    pub max_concurrent: Option<u32>,
    pub batch_size: Option<u32>,
    pub pause_between_batches: Option<u64>,
}

/// Retry policy parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base delay before the kind multiplier and backoff (ms)
    pub base_delay: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: 2000,
        }
    }
}

/// Record store layout
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Directory holding the per-source and merged stores
    pub data_dir: String,
    /// File name of the shared cross-source store
    #[serde(default = "default_merged_file")]
    pub merged_file: String,
    /// Minimum trimmed extract length for a valid record
    #[serde(default = "default_min_extract_length")]
    pub min_extract_length: usize,
    /// Records accumulated by a run before they are appended
    #[serde(default = "default_flush_batch_size")]
    pub flush_batch_size: usize,
    /// Optional SQLite secondary store
    #[serde(default)]
    pub database_path: Option<String>,
}

fn default_merged_file() -> String {
    "merged_articles.csv".to_string()
}

fn default_min_extract_length() -> usize {
    100
}

fn default_flush_batch_size() -> usize {
    10
}

/// Relevance triage settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TriageConfig {
    pub enabled: bool,
    pub high_threshold: f64,
    pub medium_threshold: f64,
    /// Ceiling of the combined keyword contribution
    pub keyword_cap: f64,
    pub keywords: KeywordTiers,
    pub url: UrlRules,
    pub categories: CategoryRules,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            high_threshold: 0.8,
            medium_threshold: 0.5,
            keyword_cap: 0.6,
            keywords: KeywordTiers::default(),
            url: UrlRules::default(),
            categories: CategoryRules::default(),
        }
    }
}

/// High, medium and low keyword tiers
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordTiers {
    #[serde(default = "KeywordTier::default_high")]
    pub high: KeywordTier,
    #[serde(default = "KeywordTier::default_medium")]
    pub medium: KeywordTier,
    #[serde(default = "KeywordTier::default_low")]
    pub low: KeywordTier,
}

impl Default for KeywordTiers {
    fn default() -> Self {
        Self {
            high: KeywordTier::default_high(),
            medium: KeywordTier::default_medium(),
            low: KeywordTier::default_low(),
        }
    }
}

/// Keywords sharing one per-match weight and one tier cap
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordTier {
    #[serde(default)]
    pub keywords: Vec<String>,
    pub weight: f64,
    pub cap: f64,
}

impl KeywordTier {
    fn with(weight: f64, cap: f64) -> Self {
        Self {
            keywords: Vec::new(),
            weight,
            cap,
        }
    }

    pub fn default_high() -> Self {
        Self::with(0.3, 0.4)
    }

    pub fn default_medium() -> Self {
        Self::with(0.15, 0.3)
    }

    pub fn default_low() -> Self {
        Self::with(0.05, 0.15)
    }
}

/// URL substring rules
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UrlRules {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub include_weight: f64,
    pub include_cap: f64,
    pub exclude_penalty: f64,
}

impl Default for UrlRules {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            include_weight: 0.1,
            include_cap: 0.2,
            exclude_penalty: 0.3,
        }
    }
}

/// Category allow-list
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CategoryRules {
    pub allow: Vec<String>,
    pub weight: f64,
    pub cap: f64,
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self {
            allow: Vec::new(),
            weight: 0.1,
            cap: 0.2,
        }
    }
}

/// One content source and its discovery channels
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Unique source name; also the per-source store file stem
    pub name: String,
    #[serde(default)]
    pub rss: Vec<String>,
    #[serde(default)]
    pub sitemaps: Vec<String>,
    #[serde(default)]
    pub listings: Vec<ListingConfig>,
    /// Also follow `Sitemap:` lines from the host's robots.txt
    #[serde(default)]
    pub robots_sitemaps: bool,
    /// Skip sitemap entries whose lastmod is older than this
    #[serde(default)]
    pub retention_days: Option<u32>,
    /// Cap on articles extracted per run
    #[serde(default)]
    pub max_articles: Option<usize>,
}

/// A listing page whose links are harvested
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListingConfig {
    pub url: String,
    /// CSS selector for article anchors (defaults to `a[href]`)
    #[serde(default)]
    pub selector: Option<String>,
    /// Keep only links whose path contains this fragment
    #[serde(default)]
    pub path_contains: Option<String>,
}
