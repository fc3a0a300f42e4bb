use crate::config::{HostOverride, PolitenessConfig};
use std::time::Duration;
use tokio::time::Instant;

/// Extra spacing steps applied for a failure streak
const MAX_FAILURE_STEPS: u32 = 4;

/// Pacing parameters for one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPolicy {
    /// Minimum spacing between requests
    pub delay_between_requests: Duration,
    /// Upper bound of the random spacing added to each gap
    pub delay_jitter: Duration,
    /// In-flight requests allowed at once
    pub max_concurrent: usize,
    /// Requests per batch before a cooldown; 0 disables batching
    pub batch_size: u32,
    /// Cooldown imposed after each batch
    pub pause_between_batches: Duration,
}

impl HostPolicy {
    /// Builds the default policy from configuration
    pub fn from_config(config: &PolitenessConfig) -> Self {
        Self {
            delay_between_requests: Duration::from_millis(config.delay_between_requests),
            delay_jitter: Duration::from_millis(config.delay_jitter),
            max_concurrent: config.max_concurrent.max(1) as usize,
            batch_size: config.batch_size,
            pause_between_batches: Duration::from_millis(config.pause_between_batches),
        }
    }

    /// Applies the fields a host override sets
    pub fn with_override(mut self, entry: &HostOverride) -> Self {
        if let Some(ms) = entry.delay_between_requests {
            self.delay_between_requests = Duration::from_millis(ms);
        }
        if let Some(ms) = entry.delay_jitter {
            self.delay_jitter = Duration::from_millis(ms);
        }
        if let Some(n) = entry.max_concurrent {
            self.max_concurrent = n.max(1) as usize;
        }
        if let Some(n) = entry.batch_size {
            self.batch_size = n;
        }
        if let Some(ms) = entry.pause_between_batches {
            self.pause_between_batches = Duration::from_millis(ms);
        }
        self
    }
}

/// Tracks the pacing state of one host
///
/// Created on the first request to a host and kept for the rest of the run.
#[derive(Debug, Clone, Default)]
pub struct RateState {
    /// Time the most recent request was (or is scheduled to be) issued
    pub last_request: Option<Instant>,

    /// Failures since the last success
    pub consecutive_failures: u32,

    /// Requests issued since the last batch cooldown
    pub requests_since_last_pause: u32,

    /// Total requests reserved against this host
    pub request_count: u64,
}

impl RateState {
    /// Creates a new RateState with no history
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next request slot and returns when it may be issued
    ///
    /// The slot is `last + delay + jitter`, pushed back by a batch cooldown
    /// when a batch boundary is crossed and by one extra `delay` per recent
    /// failure. The state is updated before the caller sleeps, so a second
    /// caller reserving right after gets the slot after this one.
    pub fn reserve(&mut self, policy: &HostPolicy, now: Instant, jitter: Duration) -> Instant {
        let mut next = match self.last_request {
            Some(last) => {
                let steps = self.consecutive_failures.min(MAX_FAILURE_STEPS);
                let spacing = policy.delay_between_requests * (1 + steps) + jitter;
                std::cmp::max(now, last + spacing)
            }
            None => now,
        };

        if policy.batch_size > 0 && self.requests_since_last_pause >= policy.batch_size {
            next += policy.pause_between_batches;
            self.requests_since_last_pause = 0;
        }

        self.requests_since_last_pause += 1;
        self.request_count += 1;
        self.last_request = Some(next);
        next
    }

    /// Time until a request could be issued, ignoring jitter
    pub fn time_until_next_request(&self, policy: &HostPolicy, now: Instant) -> Option<Duration> {
        let last = self.last_request?;
        let ready = last + policy.delay_between_requests;
        (ready > now).then(|| ready - now)
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }
}
