//! Per-client admission control.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use super::bucket::ClientBucket;
use super::clock::{Clock, SystemClock};
use super::identity::ClientIdentity;
use crate::config::LimiterConfig;
use crate::error::Result;

/// Default sustained request rate per client.
const DEFAULT_REQUESTS_PER_SECOND: f64 = 2.0;
/// Default burst size per client.
const DEFAULT_BURST_CAPACITY: u32 = 4;
/// Default idle time after which a client's bucket is dropped.
const DEFAULT_IDLE_EVICTION_AFTER: Duration = Duration::from_secs(180);
/// Default period of the eviction sweep.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Runtime settings for a [`RateLimiterRegistry`].
#[derive(Debug, Clone)]
pub struct LimiterSettings {
    /// Sustained refill rate, in tokens per second
    pub requests_per_second: f64,
    /// Bucket capacity, i.e. the largest burst admitted at once
    pub burst_capacity: u32,
    /// When false every request is admitted and no state is kept
    pub enabled: bool,
    /// Buckets untouched for longer than this are evicted by the sweep
    pub idle_eviction_after: Duration,
    /// How often the sweep runs
    pub sweep_interval: Duration,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            burst_capacity: DEFAULT_BURST_CAPACITY,
            enabled: true,
            idle_eviction_after: DEFAULT_IDLE_EVICTION_AFTER,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl From<&LimiterConfig> for LimiterSettings {
    fn from(config: &LimiterConfig) -> Self {
        Self {
            requests_per_second: config.requests_per_second,
            burst_capacity: config.burst_capacity,
            enabled: config.enabled,
            idle_eviction_after: config.idle_eviction_after(),
            sweep_interval: config.sweep_interval(),
        }
    }
}

struct Sweeper {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Token-bucket rate limiter keyed by client identity.
///
/// Buckets are created lazily on a client's first request and removed by a
/// periodic sweep once idle. The bucket map is sharded; each admission check
/// and each eviction holds the owning shard's write lock, so a single
/// bucket's refill-and-consume is atomic with respect to other checks and to
/// the sweep.
///
/// This struct is thread-safe and meant to be shared behind an `Arc`.
pub struct RateLimiterRegistry {
    buckets: DashMap<ClientIdentity, ClientBucket>,
    settings: LimiterSettings,
    clock: Arc<dyn Clock>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl RateLimiterRegistry {
    /// Create a registry that reads the system clock.
    pub fn new(settings: LimiterSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Create a registry driven by the given clock.
    pub fn with_clock(settings: LimiterSettings, clock: Arc<dyn Clock>) -> Self {
        info!(
            enabled = settings.enabled,
            rps = settings.requests_per_second,
            burst = settings.burst_capacity,
            "Rate limiter initialized"
        );
        Self {
            buckets: DashMap::new(),
            settings,
            clock,
            sweeper: Mutex::new(None),
        }
    }

    /// Decide whether a request from `remote_addr` may proceed.
    ///
    /// Returns `Ok(false)` when the client is out of tokens. Fails with
    /// `InvalidClientIdentity` when no client can be derived from the address.
    /// Always admits, without parsing or bookkeeping, when the limiter is disabled.
    pub fn admit(&self, remote_addr: &str) -> Result<bool> {
        if !self.settings.enabled {
            return Ok(true);
        }

        let client = ClientIdentity::from_remote_addr(remote_addr)?;
        Ok(self.admit_client(&client))
    }

    /// Decide whether a request from an already-derived client may proceed.
    pub fn admit_client(&self, client: &ClientIdentity) -> bool {
        if !self.settings.enabled {
            return true;
        }

        let now = self.clock.now();
        let admitted = {
            let mut bucket = self.buckets.entry(client.clone()).or_insert_with(|| {
                debug!(client = %client, "Creating token bucket");
                ClientBucket::new(
                    self.settings.burst_capacity,
                    self.settings.requests_per_second,
                    now,
                )
            });
            bucket.try_acquire(now)
        };

        if admitted {
            trace!(client = %client, "Request admitted");
        } else {
            debug!(client = %client, "Rate limit exceeded");
        }
        admitted
    }

    /// Run one eviction pass, returning the number of buckets removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let threshold = self.settings.idle_eviction_after;
        let mut evicted = 0;

        self.buckets.retain(|client, bucket| {
            let idle = bucket.is_idle(now, threshold);
            if idle {
                trace!(client = %client, "Evicting idle token bucket");
                evicted += 1;
            }
            !idle
        });

        if evicted > 0 {
            debug!(evicted, remaining = self.buckets.len(), "Rate limiter sweep finished");
        }
        evicted
    }

    /// Spawn the periodic eviction sweep.
    ///
    /// The task holds only a weak reference and ends on its own once the
    /// registry is dropped. Calling this twice, or on a disabled limiter, is a no-op.
    pub fn start(self: &Arc<Self>) {
        if !self.settings.enabled {
            return;
        }

        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return;
        }

        let (shutdown, mut stopped) = oneshot::channel();
        let registry = Arc::downgrade(self);
        let period = self.settings.sweep_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        let Some(registry) = registry.upgrade() else {
                            break;
                        };
                        registry.sweep();
                    }
                }
            }
        });

        info!(interval = ?period, "Rate limiter sweep started");
        *sweeper = Some(Sweeper { shutdown, task });
    }

    /// Cancel the sweep task and wait for it to finish.
    pub async fn stop(&self) {
        let sweeper = self.sweeper.lock().take();
        let Some(Sweeper { shutdown, task }) = sweeper else {
            return;
        };

        let _ = shutdown.send(());
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                warn!(error = %e, "Rate limiter sweep task failed");
            }
        }
        info!("Rate limiter sweep stopped");
    }

    /// Whether the sweep task is currently running.
    pub fn is_running(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|s| !s.task.is_finished())
    }

    /// Get the number of tracked clients.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Get the tokens currently held for a client, without refilling.
    ///
    /// Returns `None` if the client has no bucket.
    pub fn tokens(&self, client: &ClientIdentity) -> Option<f64> {
        self.buckets.get(client).map(|b| b.tokens())
    }

    pub fn settings(&self) -> &LimiterSettings {
        &self.settings
    }
}

impl Drop for RateLimiterRegistry {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().take() {
            sweeper.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarqueeError;
    use crate::ratelimit::ManualClock;

    fn settings(capacity: u32, rate: f64) -> LimiterSettings {
        LimiterSettings {
            requests_per_second: rate,
            burst_capacity: capacity,
            ..LimiterSettings::default()
        }
    }

    fn registry(capacity: u32, rate: f64) -> (RateLimiterRegistry, ManualClock) {
        let clock = ManualClock::default();
        let registry = RateLimiterRegistry::with_clock(settings(capacity, rate), Arc::new(clock.clone()));
        (registry, clock)
    }

    fn client(ip: &str) -> ClientIdentity {
        ClientIdentity::from_remote_addr(&format!("{ip}:40000")).unwrap()
    }

    #[test]
    fn test_registry_creation() {
        let (registry, _) = registry(4, 2.0);
        assert_eq!(registry.bucket_count(), 0);
        assert!(!registry.is_running());
    }

    #[test]
    fn test_burst_then_reject() {
        for capacity in [1, 4, 25] {
            let (registry, _) = registry(capacity, 0.5);
            let a = client("10.0.0.1");

            for _ in 0..capacity {
                assert!(registry.admit_client(&a));
            }
            assert!(!registry.admit_client(&a));
        }
    }

    #[test]
    fn test_refill_admits_exactly_one_more() {
        let (registry, clock) = registry(3, 4.0);
        let a = client("10.0.0.1");
        for _ in 0..3 {
            registry.admit_client(&a);
        }
        assert!(!registry.admit_client(&a));

        clock.advance(Duration::from_millis(250));
        assert!(registry.admit_client(&a));
        assert!(!registry.admit_client(&a));
    }

    #[test]
    fn test_capacity_four_refill_two_scenario() {
        let (registry, clock) = registry(4, 2.0);

        for _ in 0..4 {
            assert!(registry.admit("203.0.113.7:5000").unwrap());
        }
        assert!(!registry.admit("203.0.113.7:5001").unwrap());

        clock.advance(Duration::from_millis(500));
        assert!(registry.admit("203.0.113.7:5002").unwrap());
    }

    #[test]
    fn test_rejected_polls_do_not_delay_refill() {
        let (registry, clock) = registry(1, 1.0);
        let a = client("10.0.0.1");
        assert!(registry.admit_client(&a));

        for _ in 0..9 {
            clock.advance(Duration::from_millis(100));
            assert!(!registry.admit_client(&a));
        }
        clock.advance(Duration::from_millis(100));
        assert!(registry.admit_client(&a));
        assert!(!registry.admit_client(&a));
    }

    #[test]
    fn test_clients_have_separate_buckets() {
        let (registry, _) = registry(1, 1.0);

        assert!(registry.admit_client(&client("10.0.0.1")));
        assert!(!registry.admit_client(&client("10.0.0.1")));
        assert!(registry.admit_client(&client("10.0.0.2")));
        assert_eq!(registry.bucket_count(), 2);
    }

    #[test]
    fn test_rejection_consumes_nothing() {
        let (registry, _) = registry(2, 1.0);
        let a = client("10.0.0.1");
        registry.admit_client(&a);
        registry.admit_client(&a);
        registry.admit_client(&a);

        assert_eq!(registry.tokens(&a), Some(0.0));
    }

    #[test]
    fn test_invalid_identity() {
        let (registry, _) = registry(4, 2.0);
        let err = registry.admit("not-an-address").unwrap_err();
        assert!(matches!(err, MarqueeError::InvalidClientIdentity(_)));
        assert_eq!(registry.bucket_count(), 0);
    }

    #[test]
    fn test_disabled_admits_everything() {
        let settings = LimiterSettings {
            enabled: false,
            burst_capacity: 1,
            ..LimiterSettings::default()
        };
        let registry = RateLimiterRegistry::new(settings);

        for _ in 0..100 {
            assert!(registry.admit("10.0.0.1:1234").unwrap());
        }
        assert!(registry.admit("garbage").unwrap());
        assert_eq!(registry.bucket_count(), 0);
    }

    #[test]
    fn test_sweep_evicts_idle_buckets_only() {
        let (registry, clock) = registry(2, 1.0);
        let idle = client("10.0.0.1");
        let active = client("10.0.0.2");

        registry.admit_client(&idle);
        registry.admit_client(&idle);
        clock.advance(Duration::from_secs(120));
        registry.admit_client(&active);
        clock.advance(Duration::from_secs(61));

        assert_eq!(registry.sweep(), 1);
        assert_eq!(registry.tokens(&idle), None);
        assert!(registry.tokens(&active).is_some());
    }

    #[test]
    fn test_evicted_client_starts_full() {
        let (registry, clock) = registry(2, 0.001);
        let a = client("10.0.0.1");
        registry.admit_client(&a);
        registry.admit_client(&a);
        assert!(!registry.admit_client(&a));

        clock.advance(Duration::from_secs(181));
        assert_eq!(registry.sweep(), 1);

        assert!(registry.admit_client(&a));
        assert!(registry.admit_client(&a));
        assert!(!registry.admit_client(&a));
    }

    #[test]
    fn test_concurrent_checks_never_share_a_token() {
        let (registry, _) = registry(50, 0.001);
        let registry = Arc::new(registry);
        let a = client("10.0.0.1");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let a = a.clone();
                std::thread::spawn(move || (0..20).filter(|_| registry.admit_client(&a)).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }

    #[tokio::test]
    async fn test_background_sweep_and_stop() {
        let clock = ManualClock::default();
        let settings = LimiterSettings {
            sweep_interval: Duration::from_millis(10),
            ..LimiterSettings::default()
        };
        let registry = Arc::new(RateLimiterRegistry::with_clock(settings, Arc::new(clock.clone())));
        registry.start();
        assert!(registry.is_running());

        registry.admit_client(&client("10.0.0.1"));
        clock.advance(Duration::from_secs(181));

        for _ in 0..100 {
            if registry.bucket_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(registry.bucket_count(), 0);

        registry.stop().await;
        assert!(!registry.is_running());
    }

    #[tokio::test]
    async fn test_sweep_ends_when_registry_dropped() {
        let settings = LimiterSettings {
            sweep_interval: Duration::from_millis(5),
            ..LimiterSettings::default()
        };
        let registry = Arc::new(RateLimiterRegistry::new(settings));
        registry.start();
        let weak = Arc::downgrade(&registry);
        drop(registry);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(weak.upgrade().is_none());
    }
}
