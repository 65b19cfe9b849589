//! Token bucket rate limiter for metric providers.
//!
//! Only providers that declare a [`RateLimit`] get a bucket; everything else
//! passes straight through.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::provider::RateLimit;

/// Token bucket for a single provider.
#[derive(Debug)]
struct TokenBucket {
    /// Current number of available tokens.
    tokens: f64,
    /// Last time the bucket was updated.
    last_update: Instant,
    /// Token refill rate (tokens per second).
    rate: f64,
    /// Maximum bucket capacity.
    capacity: f64,
}

impl TokenBucket {
    fn new(limit: &RateLimit) -> Self {
        let capacity = limit.burst_capacity.max(1.0);
        Self {
            tokens: capacity,
            last_update: Instant::now(),
            rate: (limit.requests_per_minute.max(1)) as f64 / 60.0,
            capacity,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_available(&mut self) -> Duration {
        self.refill();

        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

/// Per-provider token buckets.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter buckets mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Install (or replace) the bucket for a provider.
    pub fn configure(&self, provider: &str, limit: &RateLimit) {
        debug!(
            "Rate limiter: '{}' limited to {}/min (burst {})",
            provider, limit.requests_per_minute, limit.burst_capacity
        );
        self.lock_buckets()
            .insert(provider.to_string(), TokenBucket::new(limit));
    }

    pub fn is_limited(&self, provider: &str) -> bool {
        self.lock_buckets().contains_key(provider)
    }

    /// Wait until the provider may be called. Unlimited providers return
    /// immediately.
    pub async fn acquire(&self, provider: &str) {
        loop {
            let wait_time = {
                let mut buckets = self.lock_buckets();
                let Some(bucket) = buckets.get_mut(provider) else {
                    return;
                };

                if bucket.try_acquire() {
                    return;
                }

                bucket.time_until_available()
            };

            if wait_time > Duration::ZERO {
                debug!(
                    "Rate limiter: waiting {:?} for provider '{}'",
                    wait_time, provider
                );
                tokio::time::sleep(wait_time).await;
            }
        }
    }

    /// Refill a provider's bucket to capacity.
    pub fn reset(&self, provider: &str) {
        if let Some(bucket) = self.lock_buckets().get_mut(provider) {
            bucket.tokens = bucket.capacity;
            bucket.last_update = Instant::now();
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
