//! Token bucket state for a single client.

use std::time::{Duration, Instant};

/// Nanoseconds per second.
const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// A continuously refilling token bucket.
///
/// Credit is kept in whole nanoseconds of accrued refill time: one token is
/// worth `period_ns` (the time to refill one token, rounded up), and the
/// bucket holds at most `capacity * period_ns`. Integer credit means time
/// spent polling while empty adds up exactly, so a token is always available
/// once `1 / refill_per_sec` seconds have passed since exhaustion.
#[derive(Debug, Clone)]
pub struct ClientBucket {
    credit_ns: u64,
    period_ns: u64,
    max_credit_ns: u64,
    capacity: u32,
    last_seen: Instant,
}

impl ClientBucket {
    /// Create a full bucket.
    pub fn new(capacity: u32, refill_per_sec: f64, now: Instant) -> Self {
        // `as` saturates, so a vanishing rate yields an effectively infinite period
        let period_ns = ((NANOS_PER_SEC / refill_per_sec).ceil() as u64).max(1);
        let max_credit_ns = period_ns.saturating_mul(u64::from(capacity));
        Self {
            credit_ns: max_credit_ns,
            period_ns,
            max_credit_ns,
            capacity,
            last_seen: now,
        }
    }

    /// Refill for the time elapsed since the last check, then try to spend one token.
    ///
    /// Returns `true` if a token was spent. A rejected check consumes nothing
    /// but still counts as activity for eviction purposes.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.credit_ns >= self.period_ns {
            self.credit_ns -= self.period_ns;
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_seen).as_nanos();
        let elapsed = u64::try_from(elapsed).unwrap_or(u64::MAX);
        self.credit_ns = self
            .credit_ns
            .saturating_add(elapsed)
            .min(self.max_credit_ns);
        self.last_seen = now;
    }

    /// Tokens currently held, including any fractional part.
    pub fn tokens(&self) -> f64 {
        self.credit_ns as f64 / self.period_ns as f64
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Whether the bucket has gone untouched for longer than `threshold`.
    pub fn is_idle(&self, now: Instant, threshold: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > threshold
    }
}
