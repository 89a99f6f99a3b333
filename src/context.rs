// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context handed to the reconciler.
//!
//! The reconciler never talks to the cluster directly. It goes through three
//! narrow collaborators bundled in [`Context`]:
//! - [`CachedView`] - eventually consistent read-only mirror of the watched kinds
//! - [`ApiClient`] - writes against the API server
//! - [`EventSink`] - user-visible audit events on the `Arman`
//!
//! Production implementations live in [`crate::cache`], [`crate::client`] and
//! [`crate::events`]. Tests swap in in-memory fakes.

use crate::crd::Arman;
use crate::errors::ApiError;
use crate::router::ResourceEvent;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use std::fmt;
use std::sync::Arc;

/// Read-only local mirror of the watched resources.
///
/// Returned objects are shared snapshots. Callers that want to change one
/// must clone it first.
pub trait CachedView: Send + Sync {
    /// Look up an `Arman` by namespace and name.
    fn get_arman(&self, namespace: Option<&str>, name: &str) -> Option<Arc<Arman>>;

    /// Look up a `Deployment` by namespace and name.
    fn get_deployment(&self, namespace: &str, name: &str) -> Option<Arc<Deployment>>;

    /// Look up a `Service` by namespace and name.
    fn get_service(&self, namespace: &str, name: &str) -> Option<Arc<Service>>;

    /// Returns true once every watched kind has completed its initial list.
    fn has_synced(&self) -> bool;
}

/// Write access to the API server.
///
/// Every method returns the object as persisted by the server.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Create a `Deployment` in `namespace`.
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ApiError>;

    /// Replace a `Deployment`, guarded by its `resourceVersion`.
    async fn update_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ApiError>;

    /// Create a `Service` in `namespace`.
    async fn create_service(&self, namespace: &str, service: &Service)
        -> Result<Service, ApiError>;

    /// Write the status subresource of an `Arman`. The spec is not touched.
    async fn update_arman_status(&self, namespace: &str, arman: &Arman)
        -> Result<Arman, ApiError>;
}

/// Event type shown by `kubectl describe`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("Normal"),
            Self::Warning => f.write_str("Warning"),
        }
    }
}

/// Sink for audit events attached to an `Arman`.
///
/// Recording is best effort: implementations log failures instead of
/// returning them.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, subject: &Arman, severity: Severity, reason: &str, message: &str);
}

/// Callback invoked by the cache for every observed change.
pub type EventHandler = Arc<dyn Fn(ResourceEvent) + Send + Sync>;

/// Collaborators shared by all workers.
#[derive(Clone)]
pub struct Context {
    /// Local mirror of `Arman`, `Deployment` and `Service` objects
    pub cache: Arc<dyn CachedView>,

    /// API server writes
    pub client: Arc<dyn ApiClient>,

    /// Audit events on the `Arman`
    pub recorder: Arc<dyn EventSink>,
}

impl Context {
    #[must_use]
    pub fn new(
        cache: Arc<dyn CachedView>,
        client: Arc<dyn ApiClient>,
        recorder: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            cache,
            client,
            recorder,
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
