// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Arman` reconciliation logic.
//!
//! One pass compares the `Arman` spec against the `Deployment` and `Service`
//! it declares and issues the writes needed to converge:
//!
//! 1. Missing children are created from the templates in [`crate::resources`]
//! 2. Existing children must be controlled by this `Arman`, otherwise the pass
//!    fails with a `Warning` event and nothing is touched
//! 3. Replica count and image drift on the `Deployment` are corrected in a
//!    single update
//! 4. The observed available replica count is written to the status
//!
//! Every pass is driven only by what the cache currently shows, so running it
//! twice in a row is harmless.

use crate::constants::{
    KIND_DEPLOYMENT, KIND_SERVICE, MESSAGE_RESOURCE_SYNCED, REASON_ERR_RESOURCE_EXISTS,
    REASON_SUCCESS_SYNCED,
};
use crate::context::{Context, Severity};
use crate::crd::Arman;
use crate::errors::{ReconcileError, SpecError};
use crate::key::split_meta_namespace_key;
use crate::metrics;
use crate::ownership::is_controlled_by;
use crate::reconcilers::status::update_arman_status;
use crate::resources::{build_deployment, build_service, deployment_image, deployment_replicas};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Check that the names of both managed resources are set.
///
/// # Errors
///
/// Returns [`SpecError`] naming the first missing field.
pub fn validate_spec(arman: &Arman, key: &str) -> Result<(), SpecError> {
    if arman.spec.deployment_name.is_empty() {
        return Err(SpecError::MissingDeploymentName {
            key: key.to_string(),
        });
    }
    if arman.spec.service_name.is_empty() {
        return Err(SpecError::MissingServiceName {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Reconcile the `Arman` identified by `key`.
///
/// Keys that cannot be parsed, `Arman`s that no longer exist and specs
/// missing a resource name end the pass successfully: retrying them cannot
/// help. Every other failure is returned so the caller retries with backoff.
///
/// # Errors
///
/// Returns [`ReconcileError`] when a write fails or a managed resource name is
/// taken by an object this `Arman` does not control.
pub async fn reconcile_arman(ctx: &Context, key: &str) -> Result<(), ReconcileError> {
    let (namespace, name) = match split_meta_namespace_key(key) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Dropping invalid resource key: {e}");
            return Ok(());
        }
    };

    let Some(arman) = ctx.cache.get_arman(namespace, name) else {
        info!("Arman {key} in work queue no longer exists");
        return Ok(());
    };

    debug!(
        key = %key,
        deployment = %arman.spec.deployment_name,
        service = %arman.spec.service_name,
        replicas = ?arman.spec.replicas,
        "Reconciling Arman"
    );

    if let Err(e) = validate_spec(&arman, key) {
        warn!("{e}");
        return Ok(());
    }

    let namespace = arman.namespace().unwrap_or_default();

    let deployment = ensure_deployment(ctx, &arman, &namespace).await?;
    let service = ensure_service(ctx, &arman, &namespace).await?;

    check_controlled(ctx, &arman, KIND_DEPLOYMENT, &deployment.metadata).await?;
    check_controlled(ctx, &arman, KIND_SERVICE, &service.metadata).await?;

    let deployment = converge_deployment(ctx, &arman, &namespace, deployment).await?;

    update_arman_status(ctx, &arman, &deployment).await?;

    ctx.recorder
        .record(
            &arman,
            Severity::Normal,
            REASON_SUCCESS_SYNCED,
            MESSAGE_RESOURCE_SYNCED,
        )
        .await;

    info!("Successfully synced Arman {key}");
    Ok(())
}

/// Return the cached `Deployment` named by the spec, creating it if absent.
async fn ensure_deployment(
    ctx: &Context,
    arman: &Arman,
    namespace: &str,
) -> Result<Arc<Deployment>, ReconcileError> {
    let name = &arman.spec.deployment_name;
    if let Some(existing) = ctx.cache.get_deployment(namespace, name) {
        return Ok(existing);
    }

    info!("Creating Deployment {namespace}/{name} for Arman {}", arman.name_any());
    let created = ctx
        .client
        .create_deployment(namespace, &build_deployment(arman))
        .await?;
    metrics::record_resource_created(KIND_DEPLOYMENT);
    Ok(Arc::new(created))
}

/// Return the cached `Service` named by the spec, creating it if absent.
///
/// An existing `Service` is never modified.
async fn ensure_service(
    ctx: &Context,
    arman: &Arman,
    namespace: &str,
) -> Result<Arc<Service>, ReconcileError> {
    let name = &arman.spec.service_name;
    if let Some(existing) = ctx.cache.get_service(namespace, name) {
        return Ok(existing);
    }

    info!("Creating Service {namespace}/{name} for Arman {}", arman.name_any());
    let created = ctx
        .client
        .create_service(namespace, &build_service(arman))
        .await?;
    metrics::record_resource_created(KIND_SERVICE);
    Ok(Arc::new(created))
}

/// Fail the pass, with a `Warning` event, if `meta` is not controlled by `arman`.
async fn check_controlled(
    ctx: &Context,
    arman: &Arman,
    kind: &'static str,
    meta: &ObjectMeta,
) -> Result<(), ReconcileError> {
    if is_controlled_by(meta, arman) {
        return Ok(());
    }

    let err = ReconcileError::ResourceExists {
        kind,
        name: meta.name.clone().unwrap_or_default(),
    };
    warn!("{kind} conflict for Arman {}: {err}", arman.name_any());
    ctx.recorder
        .record(
            arman,
            Severity::Warning,
            REASON_ERR_RESOURCE_EXISTS,
            &err.to_string(),
        )
        .await;
    Err(err)
}

/// Apply the desired replica count and image to a copy of `deployment`.
///
/// Returns `None` when the deployment already matches.
#[must_use]
pub fn desired_deployment(arman: &Arman, deployment: &Deployment) -> Option<Deployment> {
    let replicas_drift = arman
        .spec
        .replicas
        .filter(|desired| deployment_replicas(deployment) != Some(*desired));
    let image = arman.spec.deployment_image.as_str();
    let image_drift = !image.is_empty() && deployment_image(deployment) != Some(image);

    if replicas_drift.is_none() && !image_drift {
        return None;
    }

    let mut desired = deployment.clone();
    let spec = desired.spec.get_or_insert_with(Default::default);
    if let Some(replicas) = replicas_drift {
        spec.replicas = Some(replicas);
    }
    if image_drift {
        let pod_spec = spec.template.spec.get_or_insert_with(Default::default);
        match pod_spec.containers.first_mut() {
            Some(container) => container.image = Some(image.to_string()),
            None => {
                if let Some(template) = build_deployment(arman)
                    .spec
                    .and_then(|s| s.template.spec)
                {
                    pod_spec.containers = template.containers;
                }
            }
        }
    }
    Some(desired)
}

/// Bring the `Deployment` in line with the spec with at most one update.
async fn converge_deployment(
    ctx: &Context,
    arman: &Arman,
    namespace: &str,
    deployment: Arc<Deployment>,
) -> Result<Arc<Deployment>, ReconcileError> {
    let Some(desired) = desired_deployment(arman, &deployment) else {
        return Ok(deployment);
    };

    info!(
        "Updating Deployment {namespace}/{}: replicas {:?} -> {:?}, image {:?} -> {:?}",
        deployment.name_any(),
        deployment_replicas(&deployment),
        deployment_replicas(&desired),
        deployment_image(&deployment),
        deployment_image(&desired),
    );
    let updated = ctx.client.update_deployment(namespace, &desired).await?;
    metrics::record_resource_updated(KIND_DEPLOYMENT);
    Ok(Arc::new(updated))
}

#[cfg(test)]
#[path = "arman_tests.rs"]
mod arman_tests;
