// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory collaborators for unit tests.
//!
//! [`FakeApiClient`] writes through to a shared [`FakeCache`] the way the API
//! server and a watch stream would, so a reconcile that creates a resource
//! sees it on the next pass.

use crate::context::{ApiClient, CachedView, EventSink, Severity};
use crate::crd::{Arman, ArmanSpec, ArmanStatus};
use crate::errors::ApiError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// Build an `Arman` with a UID and resource version, as it would come out of a cache.
pub fn arman(namespace: &str, name: &str, deployment_name: &str, service_name: &str) -> Arman {
    let mut arman = Arman::new(
        name,
        ArmanSpec {
            deployment_name: deployment_name.to_string(),
            deployment_image: "nginx:1.27".to_string(),
            replicas: Some(1),
            service_name: service_name.to_string(),
            service_port: 80,
            service_type: String::new(),
            service_target_port: 8080,
        },
    );
    arman.metadata.namespace = Some(namespace.to_string());
    arman.metadata.uid = Some(format!("uid-{name}"));
    arman.metadata.resource_version = Some("1".to_string());
    arman
}

/// A `Deployment` named `name` controlled by `owner`, with the given replicas.
pub fn owned_deployment(owner: &Arman, name: &str, replicas: i32) -> Deployment {
    let mut deployment = crate::resources::build_deployment(owner);
    deployment.metadata.name = Some(name.to_string());
    deployment.metadata.uid = Some(format!("uid-deploy-{name}"));
    deployment.metadata.resource_version = Some("1".to_string());
    if let Some(spec) = deployment.spec.as_mut() {
        spec.replicas = Some(replicas);
    }
    deployment
}

/// A `Deployment` named `name` with no owner references.
pub fn unowned_deployment(namespace: &str, name: &str) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-foreign-{name}")),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Set the observed `status.availableReplicas` of a deployment.
pub fn with_available_replicas(mut deployment: Deployment, available: i32) -> Deployment {
    deployment.status = Some(DeploymentStatus {
        available_replicas: Some(available),
        ..Default::default()
    });
    deployment
}

/// In-memory [`CachedView`].
#[derive(Default)]
pub struct FakeCache {
    armans: Mutex<HashMap<Key, Arc<Arman>>>,
    deployments: Mutex<HashMap<Key, Arc<Deployment>>>,
    services: Mutex<HashMap<Key, Arc<Service>>>,
    synced: AtomicBool,
}

impl FakeCache {
    /// A cache that already reports synced.
    pub fn synced() -> Self {
        let cache = Self::default();
        cache.set_synced(true);
        cache
    }

    pub fn set_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::SeqCst);
    }

    pub fn insert_arman(&self, arman: Arman) {
        let k = key(&arman.namespace().unwrap_or_default(), &arman.name_any());
        self.armans.lock().unwrap().insert(k, Arc::new(arman));
    }

    pub fn insert_deployment(&self, deployment: Deployment) {
        let k = key(
            &deployment.namespace().unwrap_or_default(),
            &deployment.name_any(),
        );
        self.deployments
            .lock()
            .unwrap()
            .insert(k, Arc::new(deployment));
    }

    pub fn insert_service(&self, service: Service) {
        let k = key(&service.namespace().unwrap_or_default(), &service.name_any());
        self.services.lock().unwrap().insert(k, Arc::new(service));
    }

    pub fn remove_arman(&self, namespace: &str, name: &str) {
        self.armans.lock().unwrap().remove(&key(namespace, name));
    }
}

impl CachedView for FakeCache {
    fn get_arman(&self, namespace: Option<&str>, name: &str) -> Option<Arc<Arman>> {
        self.armans
            .lock()
            .unwrap()
            .get(&key(namespace.unwrap_or_default(), name))
            .cloned()
    }

    fn get_deployment(&self, namespace: &str, name: &str) -> Option<Arc<Deployment>> {
        self.deployments
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
    }

    fn get_service(&self, namespace: &str, name: &str) -> Option<Arc<Service>> {
        self.services
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }
}

/// Write operations of [`ApiClient`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateDeployment,
    UpdateDeployment,
    CreateService,
    UpdateStatus,
}

/// One write observed by [`FakeApiClient`].
#[derive(Clone, Debug)]
pub enum ApiCall {
    CreateDeployment(Deployment),
    UpdateDeployment(Deployment),
    CreateService(Service),
    UpdateStatus(Arman),
}

impl ApiCall {
    pub fn operation(&self) -> Operation {
        match self {
            Self::CreateDeployment(_) => Operation::CreateDeployment,
            Self::UpdateDeployment(_) => Operation::UpdateDeployment,
            Self::CreateService(_) => Operation::CreateService,
            Self::UpdateStatus(_) => Operation::UpdateStatus,
        }
    }
}

/// Recording [`ApiClient`] that writes through to a [`FakeCache`].
///
/// Failures are injected per operation with [`FakeApiClient::fail_next`] and
/// are consumed by the next call of that operation.
pub struct FakeApiClient {
    cache: Arc<FakeCache>,
    calls: Mutex<Vec<ApiCall>>,
    failures: Mutex<HashMap<Operation, Vec<ApiError>>>,
    versions: AtomicU64,
}

impl FakeApiClient {
    pub fn new(cache: Arc<FakeCache>) -> Self {
        Self {
            cache,
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            versions: AtomicU64::new(100),
        }
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: ApiError) {
        self.failures
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push(error);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.calls().iter().map(ApiCall::operation).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_failure(&self, operation: Operation) -> Result<(), ApiError> {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&operation) {
            Some(queued) if !queued.is_empty() => Err(queued.remove(0)),
            _ => Ok(()),
        }
    }

    fn next_version(&self) -> String {
        self.versions.fetch_add(1, Ordering::SeqCst).to_string()
    }
}

#[async_trait]
impl ApiClient for FakeApiClient {
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ApiError> {
        self.record(ApiCall::CreateDeployment(deployment.clone()));
        self.take_failure(Operation::CreateDeployment)?;

        let name = deployment.name_any();
        if self.cache.get_deployment(namespace, &name).is_some() {
            return Err(ApiError::AlreadyExists {
                kind: "Deployment".to_string(),
                namespace: namespace.to_string(),
                name,
            });
        }

        let mut created = deployment.clone();
        created.metadata.namespace = Some(namespace.to_string());
        created.metadata.uid = Some(format!("uid-deploy-{name}"));
        created.metadata.resource_version = Some(self.next_version());
        self.cache.insert_deployment(created.clone());
        Ok(created)
    }

    async fn update_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ApiError> {
        self.record(ApiCall::UpdateDeployment(deployment.clone()));
        self.take_failure(Operation::UpdateDeployment)?;

        let name = deployment.name_any();
        let Some(current) = self.cache.get_deployment(namespace, &name) else {
            return Err(ApiError::NotFound {
                kind: "Deployment".to_string(),
                namespace: namespace.to_string(),
                name,
            });
        };
        if current.metadata.resource_version != deployment.metadata.resource_version {
            return Err(ApiError::Conflict {
                kind: "Deployment".to_string(),
                namespace: namespace.to_string(),
                name,
                message: "the object has been modified".to_string(),
            });
        }

        let mut updated = deployment.clone();
        updated.metadata.resource_version = Some(self.next_version());
        self.cache.insert_deployment(updated.clone());
        Ok(updated)
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ApiError> {
        self.record(ApiCall::CreateService(service.clone()));
        self.take_failure(Operation::CreateService)?;

        let name = service.name_any();
        if self.cache.get_service(namespace, &name).is_some() {
            return Err(ApiError::AlreadyExists {
                kind: "Service".to_string(),
                namespace: namespace.to_string(),
                name,
            });
        }

        let mut created = service.clone();
        created.metadata.namespace = Some(namespace.to_string());
        created.metadata.uid = Some(format!("uid-svc-{name}"));
        created.metadata.resource_version = Some(self.next_version());
        self.cache.insert_service(created.clone());
        Ok(created)
    }

    async fn update_arman_status(&self, namespace: &str, arman: &Arman) -> Result<Arman, ApiError> {
        self.record(ApiCall::UpdateStatus(arman.clone()));
        self.take_failure(Operation::UpdateStatus)?;

        let name = arman.name_any();
        let Some(current) = self.cache.get_arman(Some(namespace), &name) else {
            return Err(ApiError::NotFound {
                kind: "Arman".to_string(),
                namespace: namespace.to_string(),
                name,
            });
        };
        if current.metadata.resource_version != arman.metadata.resource_version {
            return Err(ApiError::Conflict {
                kind: "Arman".to_string(),
                namespace: namespace.to_string(),
                name,
                message: "the object has been modified".to_string(),
            });
        }

        // Only the status subresource is written.
        let mut stored = (*current).clone();
        stored.status = arman.status.clone().or(Some(ArmanStatus::default()));
        stored.metadata.resource_version = Some(self.next_version());
        self.cache.insert_arman(stored.clone());
        Ok(stored)
    }
}

/// One event captured by [`FakeRecorder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    pub subject: String,
    pub severity: Severity,
    pub reason: String,
    pub message: String,
}

/// Capturing [`EventSink`].
#[derive(Default)]
pub struct FakeRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl FakeRecorder {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

#[async_trait]
impl EventSink for FakeRecorder {
    async fn record(&self, subject: &Arman, severity: Severity, reason: &str, message: &str) {
        self.events.lock().unwrap().push(RecordedEvent {
            subject: format!(
                "{}/{}",
                subject.namespace().unwrap_or_default(),
                subject.name_any()
            ),
            severity,
            reason: reason.to_string(),
            message: message.to_string(),
        });
    }
}

