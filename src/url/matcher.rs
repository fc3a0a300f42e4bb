use crate::ConfigError;

/// A host pattern from configuration
///
/// Two forms are supported:
/// 1. Exact: `example.com` matches only `example.com`
/// 2. Wildcard: `*.example.com` matches `example.com` and any subdomain of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPattern {
    base: String,
    wildcard: bool,
}

impl HostPattern {
    /// Parses a host pattern, rejecting empty or malformed patterns
    ///
    /// # Examples
    ///
    /// ```
    /// use tidewater::url::HostPattern;
    ///
    /// let pattern = HostPattern::parse("*.example.com").unwrap();
    /// assert!(pattern.matches("example.com"));
    /// assert!(pattern.matches("feeds.example.com"));
    /// assert!(!pattern.matches("example.org"));
    /// ```
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let pattern = pattern.trim().to_lowercase();
        let (base, wildcard) = match pattern.strip_prefix("*.") {
            Some(base) => (base.to_string(), true),
            None => (pattern.clone(), false),
        };

        if base.is_empty() || base.contains('*') || base.contains('/') {
            return Err(ConfigError::InvalidPattern(pattern));
        }

        Ok(Self { base, wildcard })
    }

    /// Checks whether a host (as produced by `extract_host`) matches
    pub fn matches(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        if self.wildcard {
            host == self.base || host.ends_with(&format!(".{}", self.base))
        } else {
            host == self.base
        }
    }
}
