use url::Url;

/// Extracts the host key used for politeness bookkeeping
///
/// The host is lowercased and a leading `www.` is stripped so that
/// `www.example.com` and `example.com` share one rate state. A non-default
/// port is kept, since two ports on one machine are paced independently.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use tidewater::url::extract_host;
///
/// let url = Url::parse("https://WWW.Example.com/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/feed").unwrap();
/// assert_eq!(extract_host(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").map(str::to_string).unwrap_or(host);
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_host() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_subdomain() {
        let url = Url::parse("https://news.example.com/post").unwrap();
        assert_eq!(extract_host(&url), Some("news.example.com".to_string()));
    }

    #[test]
    fn test_strips_www() {
        let url = Url::parse("https://www.example.com/post").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_keeps_explicit_port() {
        let url = Url::parse("https://example.com:8443/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com:8443".to_string()));
    }

    #[test]
    fn test_default_port_is_dropped() {
        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }
}
