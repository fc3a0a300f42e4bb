use crate::UrlError;
use url::Url;

/// Query parameters that only carry campaign or referral tracking
const TRACKING_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "mc_cid",
    "mc_eid",
    "cmpid",
    "ref",
    "ref_src",
    "source",
    "rss",
];

/// Normalizes a URL for fetching and storage
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host and remove a `www.` prefix
/// 3. Normalize the path:
///    - Remove dot segments and duplicate slashes
///    - Remove trailing slash (except for root /)
/// 4. Remove the fragment
/// 5. Remove tracking query parameters and sort the remaining ones
///
/// The scheme is preserved so the result stays fetchable. Use
/// [`canonical_key`] for identity comparisons.
///
/// # Examples
///
/// ```
/// use tidewater::url::normalize_url;
///
/// let url = normalize_url("https://WWW.EXAMPLE.COM/news/story/").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/news/story");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let path = normalize_path(url.path());
    url.set_path(&path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Produces the stable identity key for a link
///
/// This is the normalized URL with the scheme folded to `https`, so two
/// links differing only by scheme or trailing slash are the same entity.
///
/// # Examples
///
/// ```
/// use tidewater::url::canonical_key;
///
/// assert_eq!(
///     canonical_key("http://x.test/a/").unwrap(),
///     canonical_key("https://x.test/a").unwrap()
/// );
/// ```
pub fn canonical_key(url_str: &str) -> Result<String, UrlError> {
    let mut url = normalize_url(url_str)?;
    if url.scheme() == "http" {
        url.set_scheme("https")
            .map_err(|_| UrlError::Malformed(format!("Cannot fold scheme of {}", url_str)))?;
    }
    Ok(url.to_string())
}

/// Resolves an href found on a page against the page URL
///
/// Returns `None` for links that can never be articles: `javascript:`,
/// `mailto:`, `tel:`, data URIs, pure fragments and non-HTTP(S) results.
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
    {
        return None;
    }

    let resolved = base_url.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved),
        _ => None,
    }
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
