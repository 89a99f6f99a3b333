// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label constants used on every managed resource.
//!
//! The selector labels (`app`, `controller`) are immutable once a Deployment
//! exists, so they are kept separate from the informational labels.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for a unique name identifying the instance of an application
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Label Values
// ============================================================================

/// Value for `app.kubernetes.io/managed-by`
pub const MANAGED_BY_ARMAN_CONTROLLER: &str = "arman-controller";

/// Value for `app.kubernetes.io/part-of`
pub const PART_OF_ARMAN: &str = "arman";

// ============================================================================
// Selector Labels
// ============================================================================

/// Selector label carrying the managed deployment name
pub const SELECTOR_APP: &str = "app";

/// Selector label carrying the owning `Arman` name
pub const SELECTOR_CONTROLLER: &str = "controller";
