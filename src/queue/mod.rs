// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deduplicating, rate-limited work queue.
//!
//! The queue is the only synchronization point between the event router and
//! the worker pool. It provides:
//!
//! - **Deduplication** - a key that is already waiting is not queued twice
//! - **Exclusive processing** - a key handed out by [`WorkQueue::get`] is not
//!   handed out again until [`WorkQueue::done`] is called for it. If it was
//!   re-added in the meantime it is queued again on `done`
//! - **Rate-limited retries** - [`WorkQueue::add_rate_limited`] delays the
//!   re-add according to the configured [`RateLimiter`]
//! - **Draining shutdown** - after [`WorkQueue::shut_down`], `get` keeps
//!   returning buffered keys and returns `None` once the queue is empty
//!
//! # Example
//!
//! ```rust,no_run
//! use arman_controller::queue::{rate_limiter::default_controller_rate_limiter, WorkQueue};
//!
//! # async fn example() {
//! let queue: WorkQueue<String> = WorkQueue::new("armans", default_controller_rate_limiter());
//! queue.add("default/web".to_string());
//!
//! while let Some(key) = queue.get().await {
//!     // reconcile `key` ...
//!     queue.forget(&key);
//!     queue.done(&key);
//! }
//! # }
//! ```

pub mod rate_limiter;

use crate::metrics;
use rate_limiter::RateLimiter;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::trace;

/// Work queue handle. Cloning is cheap and every clone refers to the same queue.
pub struct WorkQueue<K> {
    inner: Arc<Inner<K>>,
}

impl<K> Clone for WorkQueue<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<K> {
    name: &'static str,
    state: Mutex<State<K>>,
    rate_limiter: Mutex<Box<dyn RateLimiter<K>>>,
    notify: Notify,
}

struct State<K> {
    /// Keys ready to be handed out, in order
    queue: VecDeque<K>,
    /// Keys that need processing; a superset of `queue`
    dirty: HashSet<K>,
    /// Keys currently handed out to a worker
    processing: HashSet<K>,
    shutting_down: bool,
}

impl<K> WorkQueue<K>
where
    K: Clone + Eq + Hash + Send + std::fmt::Debug + 'static,
{
    /// Create an empty queue named `name` that delays retries with `rate_limiter`.
    pub fn new(name: &'static str, rate_limiter: impl RateLimiter<K> + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                }),
                rate_limiter: Mutex::new(Box::new(rate_limiter)),
                notify: Notify::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<K>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn rate_limiter(&self) -> MutexGuard<'_, Box<dyn RateLimiter<K>>> {
        self.inner
            .rate_limiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `item` as needing processing.
    ///
    /// No-op if it is already waiting or the queue is shutting down. If the
    /// item is being processed it is queued again once `done` is called.
    pub fn add(&self, item: K) {
        let mut state = self.state();
        if state.shutting_down {
            trace!(queue = self.inner.name, item = ?item, "Ignoring add after shutdown");
            return;
        }
        if state.dirty.contains(&item) {
            trace!(queue = self.inner.name, item = ?item, "Item already queued");
            return;
        }

        metrics::record_queue_add(self.inner.name);
        state.dirty.insert(item.clone());
        if state.processing.contains(&item) {
            return;
        }

        state.queue.push_back(item);
        metrics::set_queue_depth(self.inner.name, state.queue.len());
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Wait for the next item.
    ///
    /// Returns `None` once the queue is shutting down and every buffered item
    /// has been handed out. Callers must stop calling `get` after that.
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    let remaining = state.queue.len();
                    metrics::set_queue_depth(self.inner.name, remaining);
                    drop(state);
                    if remaining > 0 {
                        self.inner.notify.notify_one();
                    }
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Mark `item` as no longer being processed.
    ///
    /// If it was added again while processing, it becomes available right away.
    pub fn done(&self, item: &K) {
        let mut state = self.state();
        state.processing.remove(item);
        if state.dirty.contains(item) {
            state.queue.push_back(item.clone());
            metrics::set_queue_depth(self.inner.name, state.queue.len());
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Add `item` after `delay` has elapsed.
    pub fn add_after(&self, item: K, delay: Duration) {
        if self.is_shutting_down() {
            return;
        }
        if delay.is_zero() {
            self.add(item);
            return;
        }

        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(item);
        });
    }

    /// Add `item` after the delay chosen by the rate limiter.
    pub fn add_rate_limited(&self, item: K) {
        let delay = self.rate_limiter().when(&item);
        metrics::record_queue_retry(self.inner.name);
        trace!(queue = self.inner.name, item = ?item, delay = ?delay, "Rate limited re-add");
        self.add_after(item, delay);
    }

    /// Reset the retry history of `item`.
    pub fn forget(&self, item: &K) {
        self.rate_limiter().forget(item);
    }

    /// How many times `item` has been re-added through the rate limiter.
    #[must_use]
    pub fn num_requeues(&self, item: &K) -> u32 {
        self.rate_limiter().num_requeues(item)
    }

    /// Stop accepting new items and wake every waiting `get`.
    pub fn shut_down(&self) {
        self.state().shutting_down = true;
        self.inner.notify.notify_waiters();
    }

    /// Returns true once [`WorkQueue::shut_down`] has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.state().shutting_down
    }

    /// Number of items waiting to be handed out.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().queue.len()
    }

    /// Returns true when no item is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
