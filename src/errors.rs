// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the Arman controller.
//!
//! This module provides specialized error types for:
//! - Remote API calls against the cluster store (create, update, status writes)
//! - Malformed reconciliation keys
//! - Incomplete `Arman` specs
//! - Reconcile attempts and controller startup
//!
//! The split matters to the worker pool: only [`ReconcileError`] values are
//! retried, key and spec problems are absorbed with a diagnostic.

use thiserror::Error;

/// HTTP status code returned by the API server for a missing object
const HTTP_NOT_FOUND: u16 = 404;

/// HTTP status code returned by the API server for conflicts
const HTTP_CONFLICT: u16 = 409;

/// Reason reported with a 409 when a create hits an existing object
const REASON_ALREADY_EXISTS: &str = "AlreadyExists";

/// Errors returned by [`crate::context::ApiClient`] implementations.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The object does not exist in the store (HTTP 404)
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Kind of the object
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
    },

    /// A create raced with another writer (HTTP 409, reason `AlreadyExists`)
    ///
    /// Usually means the local cache has not observed the object yet.
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        /// Kind of the object
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
    },

    /// The write was rejected because the object changed since it was read
    /// (HTTP 409, stale `resourceVersion`)
    #[error("{kind} {namespace}/{name} was modified concurrently: {message}")]
    Conflict {
        /// Kind of the object
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
        /// Message from the API server
        message: String,
    },

    /// Any other failure talking to the API server
    #[error("request for {kind} {namespace}/{name} failed: {source}")]
    Request {
        /// Kind of the object
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
        /// Underlying client error
        #[source]
        source: kube::Error,
    },
}

impl ApiError {
    /// Classify a `kube::Error` for the given object.
    #[must_use]
    pub fn from_kube(kind: &str, namespace: &str, name: &str, err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(response) if response.code == HTTP_NOT_FOUND => Self::NotFound {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            kube::Error::Api(response)
                if response.code == HTTP_CONFLICT && response.reason == REASON_ALREADY_EXISTS =>
            {
                Self::AlreadyExists {
                    kind: kind.to_string(),
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                }
            }
            kube::Error::Api(response) if response.code == HTTP_CONFLICT => Self::Conflict {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: response.message.clone(),
            },
            _ => Self::Request {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
                source: err,
            },
        }
    }

    /// Returns true if the object was not found.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for optimistic-concurrency failures.
    ///
    /// Both variants resolve themselves once the cache catches up, so they
    /// are retried like any other transient error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::AlreadyExists { .. })
    }
}

/// A reconciliation key that cannot be split into namespace and name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// More than one `/` separator
    #[error("unexpected key format: {0:?}")]
    UnexpectedFormat(String),

    /// The name part is empty
    #[error("key {0:?} has an empty name")]
    EmptyName(String),
}

/// A required `Arman` spec field is missing.
///
/// The reconciler absorbs these: retrying cannot help until the user edits
/// the object, which produces a fresh update event anyway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// `spec.deploymentName` is empty
    #[error("{key}: deployment name must be specified")]
    MissingDeploymentName {
        /// Reconciliation key of the `Arman`
        key: String,
    },

    /// `spec.serviceName` is empty
    #[error("{key}: service name must be specified")]
    MissingServiceName {
        /// Reconciliation key of the `Arman`
        key: String,
    },
}

/// Failure of a single reconcile attempt. Every variant is retried with backoff.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Reading, creating or updating a managed resource failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A managed resource with the declared name exists but is owned by
    /// someone else
    #[error("Resource {name:?} already exists and is not managed by Arman")]
    ResourceExists {
        /// Kind of the conflicting object
        kind: &'static str,
        /// Name of the conflicting object
        name: String,
    },

    /// Writing the `Arman` status failed
    #[error("failed to update status of Arman {key}: {source}")]
    StatusUpdate {
        /// Reconciliation key of the `Arman`
        key: String,
        /// Underlying API error
        #[source]
        source: ApiError,
    },

    /// The reconcile future panicked
    #[error("reconcile of {key} panicked: {message}")]
    Panicked {
        /// Reconciliation key being processed
        key: String,
        /// Panic payload, when it was a string
        message: String,
    },
}

impl ReconcileError {
    /// Category label used for the error metrics.
    #[must_use]
    pub fn metric_category(&self) -> &'static str {
        match self {
            Self::Api(err) | Self::StatusUpdate { source: err, .. } if err.is_conflict() => {
                "conflict"
            }
            Self::Api(_) | Self::StatusUpdate { .. } => "api_error",
            Self::ResourceExists { .. } => "resource_exists",
            Self::Panicked { .. } => "panic",
        }
    }
}

/// Errors returned by [`crate::controller::Controller::run`].
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Shutdown was requested before every cache finished its initial list
    #[error("failed to wait for caches to sync")]
    CacheSyncFailed,
}

/// Invalid command line or environment settings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A flag or environment variable holds a value the controller cannot run with
    #[error("invalid {setting}: {reason}")]
    Invalid {
        /// Flag name without the leading dashes
        setting: &'static str,
        /// What is wrong with the value
        reason: String,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
