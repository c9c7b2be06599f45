// Per-client token bucket rate limiting.
// Buckets refill `refill_rate` tokens every `interval`, up to `capacity`.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Outcome of taking one token from a client's bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

struct TokenBucket {
    tokens: u32,
    last_refill: Instant,
}

/// Token buckets keyed by client.
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    capacity: u32,
    refill_rate: u32,
    interval: Duration,
}

impl RateLimiter {
    pub fn new(capacity: u32, refill_rate: u32, interval: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            capacity,
            refill_rate,
            interval,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Take one token for `key`.
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket {
                tokens: self.capacity,
                last_refill: now,
            });

        self.refill(&mut bucket, now);

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            RateDecision::Allowed {
                remaining: bucket.tokens,
            }
        } else {
            let waited = now.saturating_duration_since(bucket.last_refill);
            RateDecision::Limited {
                retry_after: self.interval.saturating_sub(waited),
            }
        }
    }

    fn refill(&self, bucket: &mut TokenBucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let intervals = elapsed.as_nanos() / self.interval.as_nanos().max(1);
        if intervals == 0 {
            return;
        }

        let added = intervals.saturating_mul(u128::from(self.refill_rate));
        let tokens = u128::from(bucket.tokens).saturating_add(added);
        if tokens >= u128::from(self.capacity) {
            bucket.tokens = self.capacity;
            bucket.last_refill = now;
        } else {
            // Below capacity `intervals * refill_rate < capacity`, so this fits in u32.
            bucket.tokens = tokens as u32;
            bucket.last_refill += self.interval * intervals as u32;
        }
    }

    /// Drop buckets that have refilled completely; they are equivalent to new ones.
    pub fn cleanup(&self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&self, now: Instant) {
        self.buckets.retain(|_, bucket| {
            self.refill(bucket, now);
            bucket.tokens < self.capacity
        });
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}
