use crate::triage::{Priority, TriageRecord, TriageStatus};

/// Records split by what happens to them next
#[derive(Debug, Default)]
pub struct Routed {
    /// High priority, still pending; extracted this run
    pub immediate: Vec<TriageRecord>,
    /// Medium priority, moved to `queued`
    pub queued: Vec<TriageRecord>,
    /// Low priority, moved to `ignored`
    pub ignored: Vec<TriageRecord>,
}

/// Applies the priority routing transitions
///
/// Records that are no longer pending keep their status and are dropped
/// from routing.
pub fn route_by_priority(records: Vec<TriageRecord>) -> Routed {
    let mut routed = Routed::default();

    for mut record in records {
        let target = match record.priority {
            Priority::High => None,
            Priority::Medium => Some(TriageStatus::Queued),
            Priority::Low => Some(TriageStatus::Ignored),
        };

        if record.status != TriageStatus::Pending {
            tracing::debug!("Skipping routing for {} ({})", record.link.url, record.status);
            continue;
        }

        match target {
            None => routed.immediate.push(record),
            Some(status) => {
                if let Err(e) = record.transition(status) {
                    tracing::warn!("{}: {}", record.link.url, e);
                    continue;
                }
                if status == TriageStatus::Queued {
                    routed.queued.push(record);
                } else {
                    routed.ignored.push(record);
                }
            }
        }
    }

    routed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{DiscoveredLink, DiscoveryMethod};

    fn record(url: &str, priority: Priority, status: TriageStatus) -> TriageRecord {
        TriageRecord {
            link: DiscoveredLink::new(url.to_string(), "wire".to_string(), DiscoveryMethod::Sitemap),
            score: 0.0,
            priority,
            status,
            matched_keywords: Vec::new(),
        }
    }

    #[test]
    fn test_routing_by_priority() {
        let routed = route_by_priority(vec![
            record("https://e.com/1", Priority::High, TriageStatus::Pending),
            record("https://e.com/2", Priority::Medium, TriageStatus::Pending),
            record("https://e.com/3", Priority::Low, TriageStatus::Pending),
        ]);

        assert_eq!(routed.immediate.len(), 1);
        assert_eq!(routed.immediate[0].status, TriageStatus::Pending);
        assert_eq!(routed.queued[0].status, TriageStatus::Queued);
        assert_eq!(routed.ignored[0].status, TriageStatus::Ignored);
    }

    #[test]
    fn test_non_pending_records_are_not_rerouted() {
        let routed = route_by_priority(vec![
            record("https://e.com/1", Priority::High, TriageStatus::Scraped),
            record("https://e.com/2", Priority::Low, TriageStatus::Queued),
        ]);

        assert!(routed.immediate.is_empty());
        assert!(routed.queued.is_empty());
        assert!(routed.ignored.is_empty());
    }
}
