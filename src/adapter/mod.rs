//! Source adapters
//!
//! A [`SourceAdapter`] is the only place that knows how a site is laid out:
//! it finds candidate links and turns one link into an [`ArticleRecord`].
//! Adapters are registered by source name in an [`AdapterRegistry`] at
//! startup; [`FeedAdapter`] covers every source described purely by
//! configuration.

mod extract;
mod feed;

pub use extract::{extract_article, is_html};
pub use feed::FeedAdapter;

use crate::discovery::{DiscoveredLink, MergedLinks};
use crate::retry::IngestError;
use crate::store::ArticleRecord;
use crate::TidewaterError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Which discovery channels a run consults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryScope {
    /// Every configured channel
    All,
    /// Feeds only; cheap enough for frequent incremental runs
    FeedsOnly,
}

/// Capability every source provides to the orchestrator
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source name; also the per-source store name
    fn name(&self) -> &str;

    /// Finds candidate links
    ///
    /// Channel failures are reported through [`MergedLinks::outcome`],
    /// never as an error.
    async fn discover(&self, scope: DiscoveryScope) -> MergedLinks;

    /// Fetches one link and extracts its record
    ///
    /// Makes a single attempt; the caller owns retries.
    async fn extract(&self, link: &DiscoveredLink) -> Result<ArticleRecord, IngestError>;
}

/// Adapters by source name
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter, replacing any previous one with the same name
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        let name = adapter.name().to_string();
        if self.adapters.insert(name.clone(), adapter).is_some() {
            tracing::debug!("Adapter for '{}' replaced", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn SourceAdapter>, TidewaterError> {
        self.adapters
            .get(name)
            .cloned()
            .ok_or_else(|| TidewaterError::UnknownSource(name.to_string()))
    }

    /// Registered source names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
