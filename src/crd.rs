// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definition for the `Arman` resource.
//!
//! An `Arman` declares a workload (a `Deployment`) and the `Service` exposing it.
//! The controller creates both if they are missing, keeps the replica count and
//! image in line with the spec, and mirrors the deployment's available replica
//! count back into the status.
//!
//! # Example
//!
//! ```rust,no_run
//! use arman_controller::crd::{Arman, ArmanSpec};
//!
//! let spec = ArmanSpec {
//!     deployment_name: "web".to_string(),
//!     deployment_image: "nginx:1.27".to_string(),
//!     replicas: Some(2),
//!     service_name: "web".to_string(),
//!     service_port: 80,
//!     service_type: "ClusterIP".to_string(),
//!     service_target_port: 8080,
//! };
//!
//! let arman = Arman::new("web", spec);
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Desired state of an `Arman`.
///
/// Every field defaults when absent so that an incomplete object can still be
/// read; the reconciler rejects empty names itself.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "arman.com",
    version = "v1alpha1",
    kind = "Arman",
    namespaced,
    shortname = "arm",
    doc = "Arman declares a Deployment and a Service that the controller creates and keeps in sync.",
    printcolumn = r#"{"name":"Deployment","type":"string","jsonPath":".spec.deploymentName"}"#,
    printcolumn = r#"{"name":"Desired","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Available","type":"integer","jsonPath":".status.availableReplicas"}"#
)]
#[kube(status = "ArmanStatus")]
#[serde(rename_all = "camelCase")]
pub struct ArmanSpec {
    /// Name of the managed `Deployment`.
    #[serde(default)]
    pub deployment_name: String,

    /// Container image run by the managed `Deployment`.
    #[serde(default)]
    pub deployment_image: String,

    /// Desired replica count. When unset the deployment's count is left alone.
    #[serde(default)]
    pub replicas: Option<i32>,

    /// Name of the managed `Service`.
    #[serde(default)]
    pub service_name: String,

    /// Port exposed by the `Service`.
    #[serde(default)]
    pub service_port: i32,

    /// Service type (`ClusterIP`, `NodePort`, `LoadBalancer`). Empty means `ClusterIP`.
    #[serde(default)]
    pub service_type: String,

    /// Container port traffic is forwarded to. Zero means the service port.
    #[serde(default)]
    pub service_target_port: i32,
}

/// Observed state of an `Arman`. Written only by the controller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArmanStatus {
    /// Available replicas last reported by the managed `Deployment`.
    #[serde(default)]
    pub available_replicas: i32,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
