// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! API server writes for the controller, backed by `kube::Client`.
//!
//! Every write carries the controller's field manager. Updates send the
//! `resourceVersion` read from the cache, so a stale read fails with a
//! conflict instead of overwriting a newer object.

use crate::constants::{CONTROLLER_NAME, KIND_ARMAN, KIND_DEPLOYMENT, KIND_SERVICE};
use crate::context::ApiClient;
use crate::crd::Arman;
use crate::errors::ApiError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

/// [`ApiClient`] talking to a real cluster.
#[derive(Clone)]
pub struct KubeApiClient {
    client: Client,
}

impl KubeApiClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ApiClient for KubeApiClient {
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ApiError> {
        let name = deployment.name_any();
        debug!(namespace, name = %name, "Creating Deployment");
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.create(&Self::post_params(), deployment)
            .await
            .map_err(|e| ApiError::from_kube(KIND_DEPLOYMENT, namespace, &name, e))
    }

    async fn update_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ApiError> {
        let name = deployment.name_any();
        debug!(namespace, name = %name, "Updating Deployment");
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.replace(&name, &Self::post_params(), deployment)
            .await
            .map_err(|e| ApiError::from_kube(KIND_DEPLOYMENT, namespace, &name, e))
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ApiError> {
        let name = service.name_any();
        debug!(namespace, name = %name, "Creating Service");
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        api.create(&Self::post_params(), service)
            .await
            .map_err(|e| ApiError::from_kube(KIND_SERVICE, namespace, &name, e))
    }

    async fn update_arman_status(&self, namespace: &str, arman: &Arman) -> Result<Arman, ApiError> {
        let name = arman.name_any();
        let api: Api<Arman> = Api::namespaced(self.client.clone(), namespace);

        // Merge patch of the status subresource only; the resourceVersion
        // turns it into a conditional write.
        let patch = json!({
            "metadata": { "resourceVersion": arman.resource_version() },
            "status": arman.status,
        });
        let params = PatchParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..Default::default()
        };

        debug!(namespace, name = %name, "Updating Arman status");
        api.patch_status(&name, &params, &Patch::Merge(&patch))
            .await
            .map_err(|e| ApiError::from_kube(KIND_ARMAN, namespace, &name, e))
    }
}
