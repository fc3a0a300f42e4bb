use crate::discovery::{DiscoveredLink, DiscoveryStrategy};
use futures::future::join_all;
use std::collections::HashSet;

/// How a merge went, independent of how many links it produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Every strategy succeeded and at least one link was found
    Complete,
    /// Links were found but some strategies failed
    Partial { failed: Vec<String> },
    /// No links at all; `all_failed` means no channel worked
    Empty { all_failed: bool },
}

/// Union of all strategy results for one source
#[derive(Debug, Clone)]
pub struct MergedLinks {
    /// Unique by canonical key, in strategy order then document order
    pub links: Vec<DiscoveredLink>,
    pub outcome: MergeOutcome,
}

/// Runs every strategy and merges the results by canonical key
///
/// Strategies run concurrently; results are merged in the order the
/// strategies were given, so when two strategies find the same link the
/// earlier strategy's metadata wins. A failing strategy is logged and
/// skipped.
pub async fn merge_strategies(
    source: &str,
    strategies: &[Box<dyn DiscoveryStrategy>],
) -> MergedLinks {
    let results = join_all(strategies.iter().map(|s| s.discover(source))).await;

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    let mut failed = Vec::new();

    for (strategy, result) in strategies.iter().zip(results) {
        match result {
            Ok(found) => {
                let total = found.len();
                let before = links.len();
                for link in found {
                    if seen.insert(link.key()) {
                        links.push(link);
                    }
                }
                tracing::debug!(
                    "[{}] {}: {} links, {} new",
                    source,
                    strategy.label(),
                    total,
                    links.len() - before
                );
            }
            Err(e) => {
                tracing::warn!("[{}] {} failed: {}", source, strategy.label(), e);
                failed.push(strategy.label());
            }
        }
    }

    let outcome = if links.is_empty() {
        let all_failed = !strategies.is_empty() && failed.len() == strategies.len();
        if all_failed {
            tracing::warn!("[{}] source has no usable discovery channel", source);
        }
        MergeOutcome::Empty { all_failed }
    } else if failed.is_empty() {
        MergeOutcome::Complete
    } else {
        tracing::warn!(
            "[{}] discovery degraded: {} of {} strategies failed",
            source,
            failed.len(),
            strategies.len()
        );
        MergeOutcome::Partial { failed }
    };

    MergedLinks { links, outcome }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryMethod;
    use crate::retry::{ErrorKind, IngestError};
    use async_trait::async_trait;

    struct Fixed {
        method: DiscoveryMethod,
        urls: Vec<(&'static str, Option<&'static str>)>,
    }

    #[async_trait]
    impl DiscoveryStrategy for Fixed {
        fn label(&self) -> String {
            format!("fixed {}", self.method)
        }

        fn method(&self) -> DiscoveryMethod {
            self.method
        }

        async fn discover(&self, source: &str) -> Result<Vec<DiscoveredLink>, IngestError> {
            Ok(self
                .urls
                .iter()
                .filter_map(|(url, title)| {
                    let mut link = DiscoveredLink::from_raw(url, source, self.method)?;
                    link.title = title.map(str::to_string);
                    Some(link)
                })
                .collect())
        }
    }

    struct Failing;

    #[async_trait]
    impl DiscoveryStrategy for Failing {
        fn label(&self) -> String {
            "failing".to_string()
        }

        fn method(&self) -> DiscoveryMethod {
            DiscoveryMethod::Sitemap
        }

        async fn discover(&self, _source: &str) -> Result<Vec<DiscoveredLink>, IngestError> {
            Err(IngestError::from_kind(ErrorKind::Timeout, "timed out"))
        }
    }

    fn fixed(method: DiscoveryMethod, urls: Vec<(&'static str, Option<&'static str>)>) -> Box<dyn DiscoveryStrategy> {
        Box::new(Fixed { method, urls })
    }

    #[tokio::test]
    async fn test_trailing_slash_variants_merge() {
        let strategies = vec![
            fixed(DiscoveryMethod::Rss, vec![("https://x.test/a", Some("from rss"))]),
            fixed(DiscoveryMethod::Sitemap, vec![("https://x.test/a/", Some("from sitemap"))]),
        ];

        let merged = merge_strategies("x", &strategies).await;
        assert_eq!(merged.links.len(), 1);
        assert_eq!(merged.links[0].title.as_deref(), Some("from rss"));
        assert_eq!(merged.links[0].method, DiscoveryMethod::Rss);
        assert_eq!(merged.outcome, MergeOutcome::Complete);
    }

    #[tokio::test]
    async fn test_failing_strategy_does_not_abort_others() {
        let strategies = vec![
            Box::new(Failing) as Box<dyn DiscoveryStrategy>,
            fixed(DiscoveryMethod::Listing, vec![("https://x.test/b", None)]),
        ];

        let merged = merge_strategies("x", &strategies).await;
        assert_eq!(merged.links.len(), 1);
        assert_eq!(
            merged.outcome,
            MergeOutcome::Partial {
                failed: vec!["failing".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_empty_outcomes_are_distinct() {
        let all_failed = vec![Box::new(Failing) as Box<dyn DiscoveryStrategy>];
        assert_eq!(
            merge_strategies("x", &all_failed).await.outcome,
            MergeOutcome::Empty { all_failed: true }
        );

        let nothing_found = vec![fixed(DiscoveryMethod::Rss, vec![])];
        assert_eq!(
            merge_strategies("x", &nothing_found).await.outcome,
            MergeOutcome::Empty { all_failed: false }
        );
    }
}
