use crate::adapter::DiscoveryScope;
use std::fmt;
use std::str::FromStr;

/// What a source run works on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Every discovery channel
    #[default]
    Full,
    /// Feeds only
    Incremental,
    /// No discovery; drains links triage queued in earlier runs
    Backlog,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
            Self::Backlog => "backlog",
        }
    }

    /// Discovery channels for this mode; None when the mode skips discovery
    pub fn scope(&self) -> Option<DiscoveryScope> {
        match self {
            Self::Full => Some(DiscoveryScope::All),
            Self::Incremental => Some(DiscoveryScope::FeedsOnly),
            Self::Backlog => None,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "incremental" => Ok(Self::Incremental),
            "backlog" => Ok(Self::Backlog),
            other => Err(format!(
                "unknown mode '{}' (expected full, incremental or backlog)",
                other
            )),
        }
    }
}

/// Per-run knobs
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Caps extractions per source, overriding the source's own cap
    pub max_articles: Option<usize>,
}

impl RunOptions {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            max_articles: None,
        }
    }

    pub fn with_max_articles(mut self, max_articles: Option<usize>) -> Self {
        self.max_articles = max_articles;
        self
    }
}
