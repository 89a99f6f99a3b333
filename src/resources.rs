// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes resource builders for `Arman` children
//!
//! This module provides functions to build the `Deployment` and `Service`
//! declared by an `Arman`. All functions are pure and easily testable.

use crate::constants::{
    API_GROUP_VERSION, DEFAULT_SERVICE_TYPE, KIND_ARMAN, SERVICE_PORT_NAME, SERVICE_PROTOCOL,
};
use crate::crd::Arman;
use crate::labels::{
    K8S_INSTANCE, K8S_MANAGED_BY, K8S_PART_OF, MANAGED_BY_ARMAN_CONTROLLER, PART_OF_ARMAN,
    SELECTOR_APP, SELECTOR_CONTROLLER,
};
use k8s_openapi::api::{
    apps::v1::{Deployment, DeploymentSpec},
    core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec},
};
use k8s_openapi::apimachinery::pkg::{
    apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference},
    util::intstr::IntOrString,
};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::debug;

/// Labels matched by the `Deployment` and `Service` selectors.
///
/// Kept to `app` and `controller` so that adding metadata labels later never
/// changes the (immutable) deployment selector.
#[must_use]
pub fn build_selector_labels(arman: &Arman) -> BTreeMap<String, String> {
    BTreeMap::from([
        (SELECTOR_APP.to_string(), arman.spec.deployment_name.clone()),
        (SELECTOR_CONTROLLER.to_string(), arman.name_any()),
    ])
}

/// Builds standardized labels for every resource created for `arman`.
///
/// # Arguments
///
/// * `arman` - The `Arman` the resources belong to
///
/// # Returns
///
/// A `BTreeMap` with the selector labels plus the `app.kubernetes.io/*` labels
#[must_use]
pub fn build_labels(arman: &Arman) -> BTreeMap<String, String> {
    let mut labels = build_selector_labels(arman);
    labels.insert(
        K8S_MANAGED_BY.to_string(),
        MANAGED_BY_ARMAN_CONTROLLER.to_string(),
    );
    labels.insert(K8S_PART_OF.to_string(), PART_OF_ARMAN.to_string());
    labels.insert(K8S_INSTANCE.to_string(), arman.name_any());
    labels
}

/// Builds owner references for a resource owned by an `Arman`
///
/// Sets up cascade deletion so that when the `Arman` is deleted, its
/// `Deployment` and `Service` are garbage-collected by the cluster.
///
/// # Arguments
///
/// * `arman` - The `Arman` that owns this resource
///
/// # Returns
///
/// A vector containing a single controller `OwnerReference` pointing to the `Arman`
#[must_use]
pub fn build_owner_references(arman: &Arman) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: KIND_ARMAN.to_string(),
        name: arman.name_any(),
        uid: arman.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]
}

/// Port the container listens on: the target port, or the service port when
/// no target port is set.
fn container_port(arman: &Arman) -> i32 {
    if arman.spec.service_target_port > 0 {
        arman.spec.service_target_port
    } else {
        arman.spec.service_port
    }
}

/// Builds the `Deployment` declared by `arman`.
///
/// Runs a single container named after the deployment. The replica count is
/// left unset when the spec does not declare one, so the API server default
/// applies.
#[must_use]
pub fn build_deployment(arman: &Arman) -> Deployment {
    let name = arman.spec.deployment_name.clone();
    let labels = build_labels(arman);
    let port = container_port(arman);

    debug!(
        deployment = %name,
        image = %arman.spec.deployment_image,
        replicas = ?arman.spec.replicas,
        "Building Deployment for Arman"
    );

    let ports = (port > 0).then(|| {
        vec![ContainerPort {
            container_port: port,
            protocol: Some(SERVICE_PROTOCOL.to_string()),
            ..Default::default()
        }]
    });

    Deployment {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: arman.namespace(),
            labels: Some(labels.clone()),
            owner_references: Some(build_owner_references(arman)),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: arman.spec.replicas,
            selector: LabelSelector {
                match_labels: Some(build_selector_labels(arman)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name,
                        image: Some(arman.spec.deployment_image.clone()),
                        ports,
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Builds the `Service` declared by `arman`.
///
/// Exposes one TCP port named `http` that forwards `servicePort` to the
/// container port. An empty `serviceType` means `ClusterIP`.
#[must_use]
pub fn build_service(arman: &Arman) -> Service {
    let service_type = if arman.spec.service_type.is_empty() {
        DEFAULT_SERVICE_TYPE.to_string()
    } else {
        arman.spec.service_type.clone()
    };

    Service {
        metadata: ObjectMeta {
            name: Some(arman.spec.service_name.clone()),
            namespace: arman.namespace(),
            labels: Some(build_labels(arman)),
            owner_references: Some(build_owner_references(arman)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(build_selector_labels(arman)),
            ports: Some(vec![ServicePort {
                name: Some(SERVICE_PORT_NAME.into()),
                port: arman.spec.service_port,
                target_port: Some(IntOrString::Int(container_port(arman))),
                protocol: Some(SERVICE_PROTOCOL.into()),
                ..Default::default()
            }]),
            type_: Some(service_type),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Current replica count declared on a `Deployment`.
#[must_use]
pub fn deployment_replicas(deployment: &Deployment) -> Option<i32> {
    deployment.spec.as_ref().and_then(|spec| spec.replicas)
}

/// Image of the first container of a `Deployment`.
#[must_use]
pub fn deployment_image(deployment: &Deployment) -> Option<&str> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .first()?
        .image
        .as_deref()
}

/// Available replicas reported by a `Deployment`, 0 when absent.
#[must_use]
pub fn available_replicas(deployment: &Deployment) -> i32 {
    deployment
        .status
        .as_ref()
        .and_then(|status| status.available_replicas)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
