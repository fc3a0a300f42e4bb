//! Configuration module for Tidewater
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use tidewater::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("tidewater.toml")).unwrap();
//! println!("Configured sources: {}", config.sources.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CategoryRules, Config, FetchConfig, HostOverride, KeywordTier, KeywordTiers, ListingConfig,
    PolitenessConfig, RetryConfig, SourceConfig, StoreConfig, TriageConfig, UrlRules,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
