// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status reporting for `Arman` resources.
//!
//! The status mirrors what the cluster actually runs: `availableReplicas` is
//! copied from the managed `Deployment`'s observed status, never from the
//! desired count in the spec.
//!
//! # Example
//!
//! ```rust,no_run
//! use arman_controller::reconcilers::status::build_status;
//! use k8s_openapi::api::apps::v1::Deployment;
//!
//! let status = build_status(&Deployment::default());
//! assert_eq!(status.available_replicas, 0);
//! ```

use crate::context::Context;
use crate::crd::{Arman, ArmanStatus};
use crate::errors::ReconcileError;
use crate::key::meta_namespace_key;
use crate::resources::available_replicas;
use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use tracing::debug;

/// Status an `Arman` should carry given its current `Deployment`.
#[must_use]
pub fn build_status(deployment: &Deployment) -> ArmanStatus {
    ArmanStatus {
        available_replicas: available_replicas(deployment),
    }
}

/// Write the status of `arman` from the observed state of `deployment`.
///
/// The change is made on a copy of the cached object. Only the status
/// subresource is written, guarded by the copy's `resourceVersion`.
///
/// # Errors
///
/// Returns [`ReconcileError::StatusUpdate`] if the API server rejects the write.
pub async fn update_arman_status(
    ctx: &Context,
    arman: &Arman,
    deployment: &Deployment,
) -> Result<Arman, ReconcileError> {
    let namespace = arman.namespace().unwrap_or_default();
    let name = arman.name_any();

    let mut updated = arman.clone();
    updated.status = Some(build_status(deployment));

    debug!(
        "Updating status of Arman {}/{}: availableReplicas={}",
        namespace,
        name,
        updated
            .status
            .as_ref()
            .map_or(0, |status| status.available_replicas)
    );

    ctx.client
        .update_arman_status(&namespace, &updated)
        .await
        .map_err(|source| ReconcileError::StatusUpdate {
            key: meta_namespace_key(Some(&namespace), &name),
            source,
        })
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
