use crate::discovery::DiscoveredLink;
use crate::TidewaterError;
use serde::Serialize;
use std::fmt;

/// Fetch priority derived from a relevance score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Maps a score onto a priority; `score >= high` is High
    pub fn from_score(score: f64, high_threshold: f64, medium_threshold: f64) -> Self {
        if score >= high_threshold {
            Self::High
        } else if score >= medium_threshold {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a triaged link
///
/// ```text
/// Pending ──► Scraped
///    │           ▲
///    ├──► Queued ┘
///    └──► Ignored
/// ```
///
/// Nothing ever returns to Pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TriageStatus {
    /// Scored, not yet acted on
    Pending,
    /// Fetched and stored
    Scraped,
    /// Deferred to a backlog run
    Queued,
    /// Dropped from fetching
    Ignored,
}

impl TriageStatus {
    pub fn can_transition_to(&self, next: TriageStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Scraped | Self::Queued | Self::Ignored)
                | (Self::Queued, Self::Scraped)
        )
    }

    /// Scraped and Ignored accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Scraped | Self::Ignored)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scraped => "scraped",
            Self::Queued => "queued",
            Self::Ignored => "ignored",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "scraped" => Some(Self::Scraped),
            "queued" => Some(Self::Queued),
            "ignored" => Some(Self::Ignored),
            _ => None,
        }
    }
}

impl fmt::Display for TriageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// A discovered link with its relevance verdict
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageRecord {
    pub link: DiscoveredLink,
    /// Relevance in [0, 1], two decimals
    pub score: f64,
    pub priority: Priority,
    pub status: TriageStatus,
    pub matched_keywords: Vec<String>,
}

impl TriageRecord {
    /// Moves the record to `next`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - transition applied
    /// * `Err(TidewaterError::InvalidTransition)` - transition not allowed
    pub fn transition(&mut self, next: TriageStatus) -> Result<(), TidewaterError> {
        if !self.status.can_transition_to(next) {
            return Err(TidewaterError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
