use crate::config::{HostOverride, PolitenessConfig};
use crate::politeness::{HostPolicy, RateState};
use crate::url::HostPattern;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Per-host bookkeeping held by the limiter
struct HostSlot {
    state: RateState,
    policy: HostPolicy,
    in_flight: Arc<Semaphore>,
}

/// Permission to issue one request to a host
///
/// Holding the permit occupies one of the host's concurrent slots; drop it
/// once the response has been read.
pub struct PolitePermit {
    host: String,
    _permit: OwnedSemaphorePermit,
}

impl PolitePermit {
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Paces requests per host
///
/// The limiter coordinates:
/// - Minimum spacing plus random jitter between requests to a host
/// - Batch cooldowns after every `batch_size` requests
/// - Bounded in-flight requests per host (usually one)
///
/// Hosts are independent: waiting on one never delays another.
pub struct PolitenessLimiter {
    defaults: HostPolicy,
    overrides: Vec<(HostPattern, HostOverride)>,
    hosts: Mutex<HashMap<String, HostSlot>>,
}

impl PolitenessLimiter {
    /// Creates a limiter from configuration
    ///
    /// Host patterns are assumed valid; unparsable overrides are skipped
    /// with a warning.
    pub fn new(config: &PolitenessConfig) -> Self {
        let overrides = config
            .host
            .iter()
            .filter_map(|entry| match HostPattern::parse(&entry.host) {
                Ok(pattern) => Some((pattern, entry.clone())),
                Err(e) => {
                    tracing::warn!("Ignoring politeness override: {}", e);
                    None
                }
            })
            .collect();

        Self {
            defaults: HostPolicy::from_config(config),
            overrides,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Suspends until the next request to `host` may be issued
    ///
    /// This method:
    /// 1. Acquires one of the host's in-flight slots
    /// 2. Reserves the next time slot (spacing, jitter, batch cooldown)
    /// 3. Sleeps until that slot
    ///
    /// The reservation is recorded before sleeping, so overlapping waiters
    /// are handed successive slots instead of the same one. This never
    /// fails; it only delays.
    pub async fn wait(&self, host: &str) -> PolitePermit {
        let in_flight = {
            let mut hosts = self.lock_hosts();
            Arc::clone(&self.slot(&mut hosts, host).in_flight)
        };

        // The semaphore is never closed
        let permit = match in_flight.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("host semaphore closed"),
        };

        let ready_at = {
            let mut hosts = self.lock_hosts();
            let slot = self.slot(&mut hosts, host);
            let jitter = sample_jitter(slot.policy.delay_jitter);
            slot.state.reserve(&slot.policy, Instant::now(), jitter)
        };

        let now = Instant::now();
        if ready_at > now {
            tracing::trace!("Waiting {:?} before next request to {}", ready_at - now, host);
        }
        tokio::time::sleep_until(ready_at).await;

        PolitePermit {
            host: host.to_string(),
            _permit: permit,
        }
    }

    /// Records a successful response from a host
    pub fn record_success(&self, host: &str) {
        let mut hosts = self.lock_hosts();
        self.slot(&mut hosts, host).state.record_success();
    }

    /// Records a failed request to a host, widening its spacing
    pub fn record_failure(&self, host: &str) {
        let mut hosts = self.lock_hosts();
        let slot = self.slot(&mut hosts, host);
        slot.state.record_failure();
        tracing::debug!(
            "Host {} failure streak now {}",
            host,
            slot.state.consecutive_failures
        );
    }

    /// Raises a host's minimum spacing (e.g. to honour a robots Crawl-delay)
    pub fn raise_min_delay(&self, host: &str, delay: Duration) {
        let mut hosts = self.lock_hosts();
        let slot = self.slot(&mut hosts, host);
        if delay > slot.policy.delay_between_requests {
            tracing::info!("Raising spacing for {} to {:?}", host, delay);
            slot.policy.delay_between_requests = delay;
        }
    }

    /// Returns the policy that applies to a host
    pub fn policy_for(&self, host: &str) -> HostPolicy {
        let mut hosts = self.lock_hosts();
        self.slot(&mut hosts, host).policy.clone()
    }

    /// Returns a snapshot of a host's rate state, if it has been seen
    pub fn state(&self, host: &str) -> Option<RateState> {
        self.lock_hosts().get(host).map(|slot| slot.state.clone())
    }

    /// Number of hosts seen so far
    pub fn host_count(&self) -> usize {
        self.lock_hosts().len()
    }

    fn resolve_policy(&self, host: &str) -> HostPolicy {
        self.overrides
            .iter()
            .find(|(pattern, _)| pattern.matches(host))
            .map(|(_, entry)| self.defaults.clone().with_override(entry))
            .unwrap_or_else(|| self.defaults.clone())
    }

    fn slot<'a>(
        &self,
        hosts: &'a mut MutexGuard<'_, HashMap<String, HostSlot>>,
        host: &str,
    ) -> &'a mut HostSlot {
        hosts.entry(host.to_string()).or_insert_with(|| {
            let policy = self.resolve_policy(host);
            HostSlot {
                state: RateState::new(),
                in_flight: Arc::new(Semaphore::new(policy.max_concurrent)),
                policy,
            }
        })
    }

    fn lock_hosts(&self) -> MutexGuard<'_, HashMap<String, HostSlot>> {
        // A panic while holding the lock cannot leave a slot half-updated
        self.hosts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn sample_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn config(delay_ms: u64) -> PolitenessConfig {
        PolitenessConfig {
            delay_between_requests: delay_ms,
            delay_jitter: 0,
            max_concurrent: 1,
            batch_size: 0,
            pause_between_batches: 0,
            host: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let limiter = PolitenessLimiter::new(&config(1000));
        let start = Instant::now();
        let _permit = limiter.wait("example.com").await;
        assert_eq!(Instant::now() - start, Duration::ZERO);
        assert_eq!(limiter.state("example.com").unwrap().request_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_waits_for_spacing() {
        let limiter = PolitenessLimiter::new(&config(1000));
        let start = Instant::now();

        drop(limiter.wait("example.com").await);
        drop(limiter.wait("example.com").await);

        assert!(Instant::now() - start >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_waiters_get_successive_slots() {
        let mut cfg = config(1000);
        cfg.max_concurrent = 3;
        let limiter = Arc::new(PolitenessLimiter::new(&cfg));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                let _permit = limiter.wait("example.com").await;
                Instant::now() - start
            }));
        }

        let mut offsets = Vec::new();
        for handle in handles {
            offsets.push(handle.await.unwrap());
        }
        offsets.sort();

        assert_eq!(offsets[0], Duration::ZERO);
        assert!(offsets[1] >= Duration::from_millis(1000));
        assert!(offsets[2] >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_in_flight_request_per_host() {
        let limiter = Arc::new(PolitenessLimiter::new(&config(0)));
        let held = limiter.wait("example.com").await;

        let waiter = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move {
                let _permit = limiter.wait("example.com").await;
            })
        };

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_hosts_are_independent() {
        let limiter = PolitenessLimiter::new(&config(10_000));
        let start = Instant::now();

        drop(limiter.wait("a.example").await);
        drop(limiter.wait("b.example").await);

        assert_eq!(Instant::now() - start, Duration::ZERO);
        assert_eq!(limiter.host_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_override_and_raise() {
        let mut cfg = config(1000);
        cfg.host.push(HostOverride {
            host: "*.slow.example".to_string(),
            delay_between_requests: Some(5000),
            delay_jitter: None,
            max_concurrent: None,
            batch_size: None,
            pause_between_batches: None,
        });
        let limiter = PolitenessLimiter::new(&cfg);

        assert_eq!(
            limiter.policy_for("news.slow.example").delay_between_requests,
            Duration::from_millis(5000)
        );
        assert_eq!(
            limiter.policy_for("fast.example").delay_between_requests,
            Duration::from_millis(1000)
        );

        limiter.raise_min_delay("fast.example", Duration::from_secs(3));
        limiter.raise_min_delay("fast.example", Duration::from_millis(10));
        assert_eq!(
            limiter.policy_for("fast.example").delay_between_requests,
            Duration::from_secs(3)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_cooldown() {
        let mut cfg = config(100);
        cfg.batch_size = 2;
        cfg.pause_between_batches = 10_000;
        let limiter = PolitenessLimiter::new(&cfg);
        let start = Instant::now();

        for _ in 0..3 {
            drop(limiter.wait("example.com").await);
        }

        assert!(Instant::now() - start >= Duration::from_millis(10_200));
    }
}
