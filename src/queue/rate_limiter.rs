// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rate limiters deciding how long a failed item waits before it is re-queued.
//!
//! Two strategies are combined for the controller:
//!
//! - **Per-item exponential backoff** - each consecutive failure of the same key
//!   doubles its delay, so one broken object cannot hot-loop.
//! - **Overall token bucket** - caps the total retry rate across all keys, so a
//!   mass failure (API server outage) does not turn into a retry storm.
//!
//! # Retry Schedule
//!
//! With the default settings a single failing key is retried after roughly:
//!
//! 1. 5ms
//! 2. 10ms
//! 3. 20ms
//! 4. 40ms
//! 5. ... doubling ...
//! 6. 1000s (capped at max delay)

use crate::constants::{
    DEFAULT_BASE_DELAY_MILLIS, DEFAULT_BUCKET_BURST, DEFAULT_BUCKET_QPS, DEFAULT_MAX_DELAY_SECS,
};
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// Largest exponent applied before the delay is clamped to the maximum.
const MAX_BACKOFF_EXPONENT: u32 = 62;

/// Decides when an item may be retried.
pub trait RateLimiter<K>: Send {
    /// Record a failure of `item` and return how long it must wait.
    fn when(&mut self, item: &K) -> Duration;

    /// Stop tracking `item`, resetting its failure count.
    fn forget(&mut self, item: &K);

    /// Number of failures recorded for `item` since it was last forgotten.
    fn num_requeues(&self, item: &K) -> u32;
}

/// Per-item exponential backoff: `base * 2^failures`, capped at `max`.
pub struct ItemExponentialFailureRateLimiter<K> {
    base_delay: Duration,
    max_delay: Duration,
    failures: HashMap<K, u32>,
}

impl<K> ItemExponentialFailureRateLimiter<K> {
    /// Create a limiter starting at `base_delay` and never exceeding `max_delay`.
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            failures: HashMap::new(),
        }
    }
}

impl<K> RateLimiter<K> for ItemExponentialFailureRateLimiter<K>
where
    K: Clone + Eq + Hash + Send,
{
    fn when(&mut self, item: &K) -> Duration {
        let count = self.failures.entry(item.clone()).or_insert(0);
        let exponent = (*count).min(MAX_BACKOFF_EXPONENT);
        *count = count.saturating_add(1);

        let backoff = self.base_delay.as_secs_f64() * 2f64.powi(exponent as i32);
        if backoff >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(backoff)
    }

    fn forget(&mut self, item: &K) {
        self.failures.remove(item);
    }

    fn num_requeues(&self, item: &K) -> u32 {
        self.failures.get(item).copied().unwrap_or(0)
    }
}

/// Token bucket shared by all items.
///
/// Holds up to `burst` tokens and refills at `qps` tokens per second. Each
/// call to [`RateLimiter::when`] takes one token; once the bucket is empty the
/// returned delay is the time until the reservation is covered.
pub struct BucketRateLimiter {
    qps: f64,
    burst: f64,
    tokens: f64,
    last_refill: Instant,
}

impl BucketRateLimiter {
    /// Create a full bucket.
    #[must_use]
    pub fn new(qps: f64, burst: u32) -> Self {
        let burst = f64::from(burst);
        Self {
            qps,
            burst,
            tokens: burst,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.qps).min(self.burst);
        self.last_refill = now;
    }
}

impl<K> RateLimiter<K> for BucketRateLimiter {
    fn when(&mut self, _item: &K) -> Duration {
        self.refill();
        self.tokens -= 1.0;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.qps)
        }
    }

    fn forget(&mut self, _item: &K) {}

    fn num_requeues(&self, _item: &K) -> u32 {
        0
    }
}

/// Combines several limiters and always answers with the longest delay.
pub struct MaxOfRateLimiter<K> {
    limiters: Vec<Box<dyn RateLimiter<K>>>,
}

impl<K> MaxOfRateLimiter<K> {
    /// Combine `limiters`.
    #[must_use]
    pub fn new(limiters: Vec<Box<dyn RateLimiter<K>>>) -> Self {
        Self { limiters }
    }
}

impl<K> RateLimiter<K> for MaxOfRateLimiter<K> {
    fn when(&mut self, item: &K) -> Duration {
        self.limiters
            .iter_mut()
            .map(|limiter| limiter.when(item))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    fn forget(&mut self, item: &K) {
        for limiter in &mut self.limiters {
            limiter.forget(item);
        }
    }

    fn num_requeues(&self, item: &K) -> u32 {
        self.limiters
            .iter()
            .map(|limiter| limiter.num_requeues(item))
            .max()
            .unwrap_or(0)
    }
}

/// Tuning for [`controller_rate_limiter`].
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimiterSettings {
    /// First per-item retry delay
    pub base_delay: Duration,
    /// Per-item retry ceiling
    pub max_delay: Duration,
    /// Overall retry rate (tokens per second)
    pub qps: f64,
    /// Overall burst size
    pub burst: u32,
}

impl Default for RateLimiterSettings {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MILLIS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            qps: DEFAULT_BUCKET_QPS,
            burst: DEFAULT_BUCKET_BURST,
        }
    }
}

/// Per-item exponential backoff combined with an overall token bucket.
#[must_use]
pub fn controller_rate_limiter<K>(settings: &RateLimiterSettings) -> MaxOfRateLimiter<K>
where
    K: Clone + Eq + Hash + Send + 'static,
{
    MaxOfRateLimiter::new(vec![
        Box::new(ItemExponentialFailureRateLimiter::new(
            settings.base_delay,
            settings.max_delay,
        )),
        Box::new(BucketRateLimiter::new(settings.qps, settings.burst)),
    ])
}

/// The controller rate limiter with default settings (5ms..1000s, 10 qps, burst 100).
#[must_use]
pub fn default_controller_rate_limiter<K>() -> MaxOfRateLimiter<K>
where
    K: Clone + Eq + Hash + Send + 'static,
{
    controller_rate_limiter(&RateLimiterSettings::default())
}

#[cfg(test)]
#[path = "rate_limiter_tests.rs"]
mod rate_limiter_tests;
