use crate::retry::ErrorKind;

/// Body fragments served by common anti-bot interstitials
const CHALLENGE_MARKERS: &[&str] = &[
    "cf-browser-verification",
    "challenge-platform",
    "cf-chl-",
    "just a moment...",
    "attention required! | cloudflare",
    "please verify you are a human",
    "are you a robot",
    "captcha",
    "px-captcha",
    "datadome",
    "access denied | ",
];

/// Body fragments of soft rate-limit pages
const RATE_LIMIT_MARKERS: &[&str] = &["too many requests", "rate limit exceeded", "rate-limited"];

/// Raw evidence of a failure, before classification
#[derive(Debug, Clone, Copy)]
pub enum FailureSignal<'a> {
    /// An HTTP response with a non-success status (or a suspicious body)
    Status { code: u16, body: &'a str },

    /// A transport error from the HTTP client
    Transport(&'a reqwest::Error),

    /// A free-form error message reported by an adapter
    Message(&'a str),
}

/// Classifies a failure into an [`ErrorKind`]
///
/// | Evidence | Kind |
/// |----------|------|
/// | challenge markers in the body (any status) | BotChallenge |
/// | HTTP 429, or rate-limit text on 503 | RateLimited |
/// | HTTP 401 / 403 | Forbidden |
/// | HTTP 404 / 410 | NotFound |
/// | HTTP 408 / 504, client timeout | Timeout |
/// | anything else | Unknown |
///
/// # Examples
///
/// ```
/// use tidewater::retry::{classify, ErrorKind, FailureSignal};
///
/// let kind = classify(FailureSignal::Status { code: 429, body: "" });
/// assert_eq!(kind, ErrorKind::RateLimited);
/// ```
pub fn classify(signal: FailureSignal<'_>) -> ErrorKind {
    match signal {
        FailureSignal::Status { code, body } => classify_status(code, body),
        FailureSignal::Transport(error) => classify_transport(error),
        FailureSignal::Message(message) => classify_message(message),
    }
}

/// Returns true when a body looks like an anti-bot interstitial
pub fn detect_challenge(body: &str) -> bool {
    let lower = body.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn classify_status(code: u16, body: &str) -> ErrorKind {
    if detect_challenge(body) {
        return ErrorKind::BotChallenge;
    }

    match code {
        429 => ErrorKind::RateLimited,
        401 | 403 => ErrorKind::Forbidden,
        404 | 410 => ErrorKind::NotFound,
        408 | 504 => ErrorKind::Timeout,
        503 if mentions_rate_limit(body) => ErrorKind::RateLimited,
        _ => ErrorKind::Unknown,
    }
}

fn classify_transport(error: &reqwest::Error) -> ErrorKind {
    if error.is_timeout() {
        return ErrorKind::Timeout;
    }

    if let Some(status) = error.status() {
        return classify_status(status.as_u16(), "");
    }

    ErrorKind::Unknown
}

fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();

    if detect_challenge(&lower) {
        ErrorKind::BotChallenge
    } else if lower.contains("429") || mentions_rate_limit(&lower) {
        ErrorKind::RateLimited
    } else if lower.contains("403") || lower.contains("forbidden") {
        ErrorKind::Forbidden
    } else if lower.contains("404") || lower.contains("not found") {
        ErrorKind::NotFound
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ErrorKind::Timeout
    } else {
        ErrorKind::Unknown
    }
}

fn mentions_rate_limit(body: &str) -> bool {
    let lower = body.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16, body: &str) -> ErrorKind {
        classify(FailureSignal::Status { code, body })
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(status(429, ""), ErrorKind::RateLimited);
        assert_eq!(status(403, "Forbidden"), ErrorKind::Forbidden);
        assert_eq!(status(401, ""), ErrorKind::Forbidden);
        assert_eq!(status(404, "Not Found"), ErrorKind::NotFound);
        assert_eq!(status(410, ""), ErrorKind::NotFound);
        assert_eq!(status(504, ""), ErrorKind::Timeout);
        assert_eq!(status(500, "oops"), ErrorKind::Unknown);
    }

    #[test]
    fn test_challenge_body_wins_over_status() {
        let body = "<html><title>Just a moment...</title><div id=\"cf-chl-widget\"></div>";
        assert_eq!(status(403, body), ErrorKind::BotChallenge);
        assert_eq!(status(503, body), ErrorKind::BotChallenge);
        assert_eq!(status(200, body), ErrorKind::BotChallenge);
    }

    #[test]
    fn test_soft_rate_limit_page() {
        assert_eq!(
            status(503, "<h1>Too Many Requests</h1>"),
            ErrorKind::RateLimited
        );
        assert_eq!(status(503, "maintenance"), ErrorKind::Unknown);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            classify(FailureSignal::Message("navigation timeout of 30000 ms exceeded")),
            ErrorKind::Timeout
        );
        assert_eq!(
            classify(FailureSignal::Message("Request failed with status code 404")),
            ErrorKind::NotFound
        );
        assert_eq!(
            classify(FailureSignal::Message("Request failed with status code 429")),
            ErrorKind::RateLimited
        );
        assert_eq!(
            classify(FailureSignal::Message("page shows a CAPTCHA")),
            ErrorKind::BotChallenge
        );
        assert_eq!(
            classify(FailureSignal::Message("socket hang up")),
            ErrorKind::Unknown
        );
    }

    #[test]
    fn test_detect_challenge() {
        assert!(detect_challenge("Please verify you are a human"));
        assert!(!detect_challenge("<p>Quarterly results beat estimates.</p>"));
    }
}
