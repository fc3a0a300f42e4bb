use crate::config::types::{
    Config, FetchConfig, PolitenessConfig, SourceConfig, StoreConfig, TriageConfig,
    UserAgentConfig,
};
use crate::url::HostPattern;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_user_agent_config(&config.user_agent)?;
    validate_fetch_config(&config.fetch)?;
    validate_politeness_config(&config.politeness)?;
    validate_store_config(&config.store)?;
    validate_triage_config(&config.triage)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "fetch timeouts must be at least one second".to_string(),
        ));
    }
    Ok(())
}

/// Validates default pacing and every host override
fn validate_politeness_config(config: &PolitenessConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 {
        return Err(ConfigError::Validation(format!(
            "politeness max-concurrent must be >= 1, got {}",
            config.max_concurrent
        )));
    }

    for entry in &config.host {
        HostPattern::parse(&entry.host)?;
        if entry.max_concurrent == Some(0) {
            return Err(ConfigError::Validation(format!(
                "max-concurrent for host '{}' must be >= 1",
                entry.host
            )));
        }
    }

    Ok(())
}

fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "store data-dir cannot be empty".to_string(),
        ));
    }

    if config.merged_file.is_empty() || config.merged_file.contains('/') {
        return Err(ConfigError::Validation(format!(
            "store merged-file must be a plain file name, got '{}'",
            config.merged_file
        )));
    }

    if config.min_extract_length == 0 {
        return Err(ConfigError::Validation(
            "store min-extract-length must be >= 1".to_string(),
        ));
    }

    if config.flush_batch_size == 0 {
        return Err(ConfigError::Validation(
            "store flush-batch-size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates thresholds and weights, all of which live in [0, 1]
fn validate_triage_config(config: &TriageConfig) -> Result<(), ConfigError> {
    let unit_values = [
        ("high-threshold", config.high_threshold),
        ("medium-threshold", config.medium_threshold),
        ("keyword-cap", config.keyword_cap),
        ("keywords.high.weight", config.keywords.high.weight),
        ("keywords.high.cap", config.keywords.high.cap),
        ("keywords.medium.weight", config.keywords.medium.weight),
        ("keywords.medium.cap", config.keywords.medium.cap),
        ("keywords.low.weight", config.keywords.low.weight),
        ("keywords.low.cap", config.keywords.low.cap),
        ("url.include-weight", config.url.include_weight),
        ("url.include-cap", config.url.include_cap),
        ("url.exclude-penalty", config.url.exclude_penalty),
        ("categories.weight", config.categories.weight),
        ("categories.cap", config.categories.cap),
    ];

    for (name, value) in unit_values {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "triage {} must be within [0, 1], got {}",
                name, value
            )));
        }
    }

    if config.medium_threshold > config.high_threshold {
        return Err(ConfigError::Validation(format!(
            "triage medium-threshold ({}) cannot exceed high-threshold ({})",
            config.medium_threshold, config.high_threshold
        )));
    }

    Ok(())
}

/// Validates source names and every discovery URL
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for source in sources {
        if source.name.is_empty()
            || !source
                .name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::Validation(format!(
                "source name must be non-empty and contain only alphanumerics, '-' or '_', got '{}'",
                source.name
            )));
        }

        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }

        let listing_urls = source.listings.iter().map(|l| &l.url);
        for url in source.rss.iter().chain(&source.sitemaps).chain(listing_urls) {
            validate_http_url(&source.name, url)?;
        }

        if source.max_articles == Some(0) {
            return Err(ConfigError::Validation(format!(
                "source '{}' max-articles must be >= 1",
                source.name
            )));
        }
    }

    Ok(())
}

fn validate_http_url(source: &str, url: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(url).map_err(|e| {
        ConfigError::InvalidUrl(format!("source '{}': invalid URL '{}': {}", source, url, e))
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidUrl(format!(
            "source '{}': URL '{}' uses unsupported scheme '{}'",
            source, url, other
        ))),
    }
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::Validation(format!("Invalid contact-email: '{}'", email));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(invalid());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ListingConfig, TriageConfig};

    fn source(name: &str) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            rss: vec!["https://example.com/feed".to_string()],
            sitemaps: vec![],
            listings: vec![],
            robots_sitemaps: false,
            retention_days: None,
            max_articles: None,
        }
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("desk@news.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }

    #[test]
    fn test_duplicate_source_names_rejected() {
        let result = validate_sources(&[source("wire"), source("wire")]);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_bad_source_name_rejected() {
        assert!(validate_sources(&[source("has space")]).is_err());
        assert!(validate_sources(&[source("")]).is_err());
        assert!(validate_sources(&[source("bio_space-2")]).is_ok());
    }

    #[test]
    fn test_non_http_listing_rejected() {
        let mut s = source("wire");
        s.listings.push(ListingConfig {
            url: "ftp://example.com/list".to_string(),
            selector: None,
            path_contains: None,
        });
        assert!(matches!(
            validate_sources(&[s]),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_triage_threshold_order() {
        let mut triage = TriageConfig::default();
        assert!(validate_triage_config(&triage).is_ok());

        triage.medium_threshold = 0.9;
        assert!(validate_triage_config(&triage).is_err());
    }

    #[test]
    fn test_triage_values_must_be_unit_range() {
        let mut triage = TriageConfig::default();
        triage.keywords.high.cap = 1.5;
        assert!(validate_triage_config(&triage).is_err());
    }

    #[test]
    fn test_politeness_host_override_pattern() {
        let mut politeness = PolitenessConfig::default();
        politeness.host.push(crate::config::HostOverride {
            host: "*.".to_string(),
            delay_between_requests: None,
            delay_jitter: None,
            max_concurrent: None,
            batch_size: None,
            pause_between_batches: None,
        });
        assert!(matches!(
            validate_politeness_config(&politeness),
            Err(ConfigError::InvalidPattern(_))
        ));
    }
}
