//! Rate limiting utilities

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Simple keyed token-bucket rate limiter.
///
/// Keyed by whatever identifies a caller at the boundary where it is used
/// (IPC client id, user id).
#[derive(Debug)]
pub struct RateLimiter<K> {
    max_tokens: u32,
    refill_interval: Duration,
    buckets: HashMap<K, Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

impl<K: Eq + Hash + Clone> RateLimiter<K> {
    /// Create a limiter allowing `max_requests` per `interval` per key.
    pub fn new(max_requests: u32, interval: Duration) -> Self {
        Self {
            max_tokens: max_requests,
            refill_interval: interval,
            buckets: HashMap::new(),
        }
    }

    /// Check whether a request for `key` should be allowed.
    pub fn check(&mut self, key: &K) -> bool {
        let now = Instant::now();

        let bucket = self.buckets.entry(key.clone()).or_insert(Bucket {
            tokens: self.max_tokens,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill);
        if elapsed >= self.refill_interval {
            let intervals = (elapsed.as_millis() / self.refill_interval.as_millis()) as u32;
            bucket.tokens = (bucket.tokens + intervals * self.max_tokens).min(self.max_tokens);
            bucket.last_refill = now;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Drop the bucket for a departed caller.
    pub fn remove(&mut self, key: &K) {
        self.buckets.remove(key);
    }

    /// Clean up buckets idle longer than `stale_after`.
    pub fn cleanup(&mut self, stale_after: Duration) {
        let now = Instant::now();
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.last_refill) < stale_after);
    }
}
