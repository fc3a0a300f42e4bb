use std::fmt;
use thiserror::Error;

/// Classified cause of a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// HTTP 401/403 without challenge markers
    Forbidden,

    /// HTTP 429 or an explicit rate-limit page
    RateLimited,

    /// Anti-bot interstitial (captcha, JavaScript challenge)
    BotChallenge,

    /// Request or gateway timeout
    Timeout,

    /// HTTP 404/410; the content does not exist
    NotFound,

    /// Anything else (5xx, connection resets, malformed responses)
    Unknown,
}

impl ErrorKind {
    /// NotFound is terminal; every other kind is transient
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound)
    }

    /// Multiplier applied to the base retry delay
    ///
    /// Rate limits and challenges wait longer than a bare timeout.
    pub fn delay_multiplier(&self) -> u32 {
        match self {
            Self::Timeout => 1,
            Self::Unknown => 2,
            Self::Forbidden => 3,
            Self::BotChallenge => 4,
            Self::RateLimited => 5,
            Self::NotFound => 0,
        }
    }

    /// Whether a heavier, browser-backed fetch might get past this failure
    pub fn warrants_escalation(&self) -> bool {
        matches!(self, Self::Forbidden | Self::BotChallenge)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forbidden => "forbidden",
            Self::RateLimited => "rate_limited",
            Self::BotChallenge => "bot_challenge",
            Self::Timeout => "timeout",
            Self::NotFound => "not_found",
            Self::Unknown => "unknown",
        }
    }

    pub fn all() -> [Self; 6] {
        [
            Self::Forbidden,
            Self::RateLimited,
            Self::BotChallenge,
            Self::Timeout,
            Self::NotFound,
            Self::Unknown,
        ]
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a failed discovery, extract or append step
///
/// Callers branch on the variant rather than on message text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestError {
    /// Transient failure; the retry policy may try again
    #[error("{kind} (retryable): {message}")]
    Retryable { kind: ErrorKind, message: String },

    /// Permanent failure; never retried
    #[error("{kind}: {message}")]
    Terminal { kind: ErrorKind, message: String },

    /// Extracted content is unusable (missing link, short extract)
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// The link is already recorded
    #[error("duplicate link: {0}")]
    Duplicate(String),
}

impl IngestError {
    /// Wraps a classified kind in the matching variant
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        if kind.is_retryable() {
            Self::Retryable { kind, message }
        } else {
            Self::Terminal { kind, message }
        }
    }

    /// A malformed page or response that will not improve on retry
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Terminal {
            kind: ErrorKind::Unknown,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Retryable { kind, .. } | Self::Terminal { kind, .. } => Some(*kind),
            Self::ValidationFailed(_) | Self::Duplicate(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_not_found_is_terminal() {
        for kind in ErrorKind::all() {
            assert_eq!(kind.is_retryable(), kind != ErrorKind::NotFound);
        }
    }

    #[test]
    fn test_rate_limit_waits_longer_than_timeout() {
        assert!(
            ErrorKind::RateLimited.delay_multiplier() > ErrorKind::Timeout.delay_multiplier()
        );
        assert!(
            ErrorKind::BotChallenge.delay_multiplier() > ErrorKind::Timeout.delay_multiplier()
        );
    }

    #[test]
    fn test_from_kind_picks_variant() {
        assert!(IngestError::from_kind(ErrorKind::Timeout, "slow").is_retryable());
        assert_eq!(
            IngestError::from_kind(ErrorKind::NotFound, "gone"),
            IngestError::Terminal {
                kind: ErrorKind::NotFound,
                message: "gone".to_string()
            }
        );
        assert_eq!(IngestError::ValidationFailed("x".into()).kind(), None);
    }

    #[test]
    fn test_display() {
        let err = IngestError::from_kind(ErrorKind::RateLimited, "HTTP 429");
        assert_eq!(err.to_string(), "rate_limited (retryable): HTTP 429");
    }
}
