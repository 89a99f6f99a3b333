// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The `Arman` controller: event intake and the worker pool.
//!
//! Changes observed by the cache are routed to keys and added to the work
//! queue by [`Controller::handle_event`]. [`Controller::run`] waits for the
//! cache to sync, then starts N workers that each loop:
//!
//! ```text
//! get -> reconcile -> forget (ok) | add_rate_limited (error) -> done
//! ```
//!
//! A reconcile that panics is treated like one that failed: the key is
//! retried with backoff and the worker keeps going.

use crate::constants::{CACHE_SYNC_POLL_INTERVAL_MILLIS, KIND_ARMAN, WORK_QUEUE_NAME};
use crate::context::{Context, EventHandler};
use crate::errors::{ControllerError, ReconcileError};
use crate::metrics;
use crate::queue::rate_limiter::{default_controller_rate_limiter, RateLimiter};
use crate::queue::WorkQueue;
use crate::reconcilers::reconcile_arman;
use crate::router::{route, ResourceEvent};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Owns the work queue and the collaborators shared by all workers.
#[derive(Clone)]
pub struct Controller {
    ctx: Arc<Context>,
    queue: WorkQueue<String>,
}

impl Controller {
    /// Create a controller whose retries are delayed by `rate_limiter`.
    pub fn new(ctx: Arc<Context>, rate_limiter: impl RateLimiter<String> + 'static) -> Self {
        Self {
            ctx,
            queue: WorkQueue::new(WORK_QUEUE_NAME, rate_limiter),
        }
    }

    /// Create a controller with the default retry policy.
    #[must_use]
    pub fn with_default_rate_limiter(ctx: Arc<Context>) -> Self {
        Self::new(ctx, default_controller_rate_limiter())
    }

    /// The work queue feeding the workers.
    #[must_use]
    pub fn queue(&self) -> &WorkQueue<String> {
        &self.queue
    }

    /// Route one observed change and enqueue the resulting key, if any.
    pub fn handle_event(&self, event: ResourceEvent) {
        if let Some(key) = route(&event) {
            debug!(kind = event.kind(), key = %key, "Enqueuing Arman");
            self.queue.add(key);
        }
    }

    /// A callback for the cache that feeds [`Controller::handle_event`].
    #[must_use]
    pub fn event_handler(&self) -> EventHandler {
        let controller = self.clone();
        Arc::new(move |event| controller.handle_event(event))
    }

    /// Wait for the cache, run `workers` workers until `shutdown` resolves,
    /// then drain the queue and wait for the workers to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::CacheSyncFailed`] if `shutdown` resolves
    /// before the cache has synced.
    pub async fn run(
        &self,
        workers: usize,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ControllerError> {
        tokio::pin!(shutdown);

        info!("Starting Arman controller");
        info!("Waiting for informer caches to sync");
        if !self.wait_for_cache_sync(&mut shutdown).await {
            self.queue.shut_down();
            return Err(ControllerError::CacheSyncFailed);
        }

        info!("Starting {workers} workers");
        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let controller = self.clone();
                tokio::spawn(async move { controller.run_worker(id).await })
            })
            .collect();
        info!("Started workers");

        shutdown.await;

        info!("Shutting down workers");
        self.queue.shut_down();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker task failed: {e}");
            }
        }
        info!("Workers stopped");
        Ok(())
    }

    /// Poll the cache until it reports synced. Returns false on shutdown.
    async fn wait_for_cache_sync<F>(&self, shutdown: &mut std::pin::Pin<&mut F>) -> bool
    where
        F: Future<Output = ()>,
    {
        let mut poll = tokio::time::interval(Duration::from_millis(CACHE_SYNC_POLL_INTERVAL_MILLIS));
        loop {
            if self.ctx.cache.has_synced() {
                return true;
            }
            tokio::select! {
                () = shutdown.as_mut() => return false,
                _ = poll.tick() => {}
            }
        }
    }

    async fn run_worker(&self, id: usize) {
        debug!(worker = id, "Worker started");
        while self.process_next_work_item().await {}
        debug!(worker = id, "Worker stopped");
    }

    /// Take one key from the queue and reconcile it.
    ///
    /// Returns false once the queue has shut down and is empty.
    pub async fn process_next_work_item(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };

        let start = Instant::now();
        let result = AssertUnwindSafe(reconcile_arman(&self.ctx, &key))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(ReconcileError::Panicked {
                    key: key.clone(),
                    message: panic_message(payload.as_ref()),
                })
            });

        match result {
            Ok(()) => {
                self.queue.forget(&key);
                metrics::record_reconciliation_success(KIND_ARMAN, start.elapsed());
                debug!("Successfully synced '{key}'");
            }
            Err(e) => {
                let category = e.metric_category();
                metrics::record_reconciliation_error(KIND_ARMAN, start.elapsed());
                metrics::record_error(KIND_ARMAN, category);
                metrics::record_reconciliation_requeue(KIND_ARMAN, category);
                if matches!(e, ReconcileError::Panicked { .. }) {
                    error!("Recovered from panic while syncing '{key}': {e}");
                } else {
                    error!(
                        requeues = self.queue.num_requeues(&key),
                        "Error syncing '{key}': {e}, requeuing"
                    );
                }
                self.queue.add_rate_limited(key.clone());
            }
        }

        self.queue.done(&key);
        true
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
