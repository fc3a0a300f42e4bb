//! Tidewater: a polite news ingestion core
//!
//! This crate discovers, fetches, deduplicates, scores and durably records
//! article metadata from many independent sources, pacing requests per host
//! and classifying failures so that every source adapter shares one retry
//! policy and one ordered, duplicate-free record store.

pub mod adapter;
pub mod config;
pub mod discovery;
pub mod fetch;
pub mod orchestrator;
pub mod politeness;
pub mod report;
pub mod retry;
pub mod robots;
pub mod store;
pub mod triage;
pub mod url;

use thiserror::Error;

/// Main error type for Tidewater operations
#[derive(Debug, Error)]
pub enum TidewaterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("No adapter registered for source '{0}'")]
    UnknownSource(String),

    #[error("Invalid triage transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: triage::TriageStatus,
        to: triage::TriageStatus,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid host pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Tidewater operations
pub type Result<T> = std::result::Result<T, TidewaterError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use adapter::{AdapterRegistry, SourceAdapter};
pub use config::Config;
pub use discovery::{DiscoveredLink, DiscoveryMethod};
pub use orchestrator::{IngestContext, Orchestrator, RunMode, RunOptions};
pub use politeness::PolitenessLimiter;
pub use report::RunReport;
pub use retry::{classify, ErrorKind, IngestError, RetryPolicy};
pub use store::{AppendReport, ArticleRecord, ArticleStore};
pub use triage::{Priority, TriageRecord, TriageStatus};
pub use url::{canonical_key, extract_host, normalize_url};
