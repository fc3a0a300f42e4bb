use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Each run records this hash so that counts from runs with different
/// keyword lists or pacing can be told apart.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID_CONFIG: &str = r#"
[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[politeness]
delay-between-requests = 1500
delay-jitter = 500
batch-size = 20
pause-between-batches = 60000

[[politeness.host]]
host = "*.slow.example"
delay-between-requests = 8000

[retry]
max-retries = 2
base-delay = 1000

[store]
data-dir = "./data"

[triage]
enabled = true

[triage.keywords.high]
keywords = ["FDA", "approval"]
weight = 0.3
cap = 0.2

[[source]]
name = "biowire"
rss = ["https://biowire.example/feed"]
sitemaps = ["https://biowire.example/sitemap.xml"]
retention-days = 30

[[source.listings]]
url = "https://biowire.example/news"
path-contains = "/news/"
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.user_agent.crawler_name, "TestCrawler");
        assert_eq!(config.politeness.delay_between_requests, 1500);
        assert_eq!(config.politeness.max_concurrent, 1);
        assert_eq!(config.politeness.host.len(), 1);
        assert_eq!(config.politeness.host[0].delay_between_requests, Some(8000));
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.store.merged_file, "merged_articles.csv");
        assert_eq!(config.store.min_extract_length, 100);
        assert!(config.triage.enabled);
        assert_eq!(config.triage.keywords.high.keywords, vec!["FDA", "approval"]);
        assert_eq!(config.triage.keywords.high.cap, 0.2);
        assert_eq!(config.triage.keywords.medium.weight, 0.15);
        assert_eq!(config.triage.high_threshold, 0.8);

        let source = config.source("biowire").unwrap();
        assert_eq!(source.retention_days, Some(30));
        assert_eq!(source.listings[0].path_contains.as_deref(), Some("/news/"));
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = parse_config(
            r#"
[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[store]
data-dir = "./data"
"#,
        )
        .unwrap();

        assert_eq!(config.fetch.timeout_secs, 30);
        assert!(config.fetch.respect_robots);
        assert_eq!(config.retry.base_delay, 2000);
        assert!(!config.triage.enabled);
        assert!(config.sources.is_empty());
        assert!(config.store.database_path.is_none());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/tidewater.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = VALID_CONFIG.replace("batch-size = 20", "max-concurrent = 0");
        let file = create_temp_config(&content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
