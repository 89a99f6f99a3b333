// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Arman controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the Arman CRD
pub const API_GROUP: &str = "arman.com";

/// API version for the Arman CRD
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "arman.com/v1alpha1";

/// Kind name for `Arman` resource
pub const KIND_ARMAN: &str = "Arman";

/// Kind name for the managed `Deployment`
pub const KIND_DEPLOYMENT: &str = "Deployment";

/// Kind name for the managed `Service`
pub const KIND_SERVICE: &str = "Service";

// ============================================================================
// Controller Identity
// ============================================================================

/// Name reported as the event source and used as field manager for writes
pub const CONTROLLER_NAME: &str = "arman-controller";

/// Name of the work queue, used in logs and metrics
pub const WORK_QUEUE_NAME: &str = "armans";

// ============================================================================
// Event Reasons and Messages
// ============================================================================

/// Event reason used when an `Arman` is synced
pub const REASON_SUCCESS_SYNCED: &str = "Synced";

/// Event reason used when an `Arman` fails to sync because a managed
/// resource of the same name already exists and is owned by someone else
pub const REASON_ERR_RESOURCE_EXISTS: &str = "ErrResourceExists";

/// Event message for a successful sync
pub const MESSAGE_RESOURCE_SYNCED: &str = "Arman synced successfully";

/// Event action reported alongside every event
pub const EVENT_ACTION_RECONCILE: &str = "Reconcile";

// ============================================================================
// Service Defaults
// ============================================================================

/// Service type used when the spec leaves it empty
pub const DEFAULT_SERVICE_TYPE: &str = "ClusterIP";

/// Protocol for the exposed service port
pub const SERVICE_PROTOCOL: &str = "TCP";

/// Name of the exposed service port
pub const SERVICE_PORT_NAME: &str = "http";

// ============================================================================
// Controller Runtime Constants
// ============================================================================

/// Default number of concurrent workers
pub const DEFAULT_WORKERS: usize = 2;

/// Interval between cache sync checks during startup (milliseconds)
pub const CACHE_SYNC_POLL_INTERVAL_MILLIS: u64 = 100;

/// Default address for the metrics and health endpoint
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

// ============================================================================
// Rate Limiter Defaults
// ============================================================================

/// Per-item backoff base delay (milliseconds)
pub const DEFAULT_BASE_DELAY_MILLIS: u64 = 5;

/// Per-item backoff ceiling (seconds)
pub const DEFAULT_MAX_DELAY_SECS: u64 = 1000;

/// Overall token bucket refill rate (tokens per second)
pub const DEFAULT_BUCKET_QPS: f64 = 10.0;

/// Overall token bucket size
pub const DEFAULT_BUCKET_BURST: u32 = 100;
