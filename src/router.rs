// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Event routing from watch notifications to reconciliation keys.
//!
//! Every change the cache observes is turned into the key of the `Arman` it
//! concerns, or dropped:
//!
//! - `Arman` changes map to the object's own `namespace/name`
//! - `Deployment` and `Service` changes map to `<namespace>/<owner>` when the
//!   object's controller owner reference names an `Arman`; anything else is
//!   not ours and is dropped
//! - Updates where the old and new `resourceVersion` match are periodic
//!   resyncs carrying no change, and are dropped for all kinds
//!
//! [`route`] is pure. Enqueuing is done by the controller.

use crate::crd::Arman;
use crate::key::meta_namespace_key;
use crate::ownership::arman_owner;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use tracing::trace;

/// What happened to a watched object.
#[derive(Clone, Debug)]
pub enum Change<K> {
    Added(Arc<K>),
    Updated { old: Arc<K>, new: Arc<K> },
    Deleted(Arc<K>),
}

impl<K: Resource> Change<K> {
    /// The object the change should be routed by: the new version for updates.
    pub fn object(&self) -> &K {
        match self {
            Self::Added(obj) | Self::Deleted(obj) => obj,
            Self::Updated { new, .. } => new,
        }
    }

    /// Returns true for an update that carries no new version.
    pub fn is_resync(&self) -> bool {
        match self {
            Self::Updated { old, new } => {
                let old_version = old.meta().resource_version.as_deref();
                old_version.is_some() && old_version == new.meta().resource_version.as_deref()
            }
            _ => false,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Updated { .. } => "updated",
            Self::Deleted(_) => "deleted",
        }
    }
}

/// A change to one of the three watched kinds.
#[derive(Clone, Debug)]
pub enum ResourceEvent {
    Arman(Change<Arman>),
    Deployment(Change<Deployment>),
    Service(Change<Service>),
}

impl ResourceEvent {
    /// Kind of the changed object.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Arman(_) => "Arman",
            Self::Deployment(_) => "Deployment",
            Self::Service(_) => "Service",
        }
    }
}

/// Map an event to the key of the `Arman` to reconcile, or `None` to drop it.
#[must_use]
pub fn route(event: &ResourceEvent) -> Option<String> {
    match event {
        ResourceEvent::Arman(change) => {
            if change.is_resync() {
                return None;
            }
            let arman = change.object();
            Some(meta_namespace_key(
                arman.namespace().as_deref(),
                &arman.name_any(),
            ))
        }
        ResourceEvent::Deployment(change) => owner_key(change, event.kind()),
        ResourceEvent::Service(change) => owner_key(change, event.kind()),
    }
}

fn owner_key<K: Resource>(change: &Change<K>, kind: &str) -> Option<String> {
    if change.is_resync() {
        return None;
    }

    let obj = change.object();
    let Some(owner) = arman_owner(obj.meta()) else {
        trace!(
            kind,
            name = %obj.name_any(),
            change = change.verb(),
            "Ignoring object without an Arman controller"
        );
        return None;
    };

    Some(meta_namespace_key(obj.namespace().as_deref(), &owner.name))
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod router_tests;
