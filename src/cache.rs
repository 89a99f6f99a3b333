// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch-backed local cache of `Arman`, `Deployment` and `Service` objects.
//!
//! Each kind gets a reflector store fed by its own watch stream. The store is
//! read through [`KubeCache`]; the stream is driven by [`Informers`], which also
//! turns every watch event into a [`ResourceEvent`] for the controller.
//!
//! The two halves are created together but started separately, so the
//! controller can be built from the cache before the watches begin:
//!
//! ```rust,no_run
//! use arman_controller::cache::KubeCache;
//! use arman_controller::context::EventHandler;
//! use std::sync::Arc;
//!
//! # async fn example(client: kube::Client, handler: EventHandler) {
//! let (cache, informers) = KubeCache::new(client, None);
//! let cache = Arc::new(cache);
//! let _tasks = informers.start(handler);
//! # }
//! ```

use crate::context::{CachedView, EventHandler};
use crate::crd::Arman;
use crate::router::{Change, ResourceEvent};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Read side of the cache.
#[derive(Clone)]
pub struct KubeCache {
    armans: Store<Arman>,
    deployments: Store<Deployment>,
    services: Store<Service>,
    armans_synced: Arc<AtomicBool>,
    deployments_synced: Arc<AtomicBool>,
    services_synced: Arc<AtomicBool>,
}

/// Write side of the cache: the not yet started watch streams.
pub struct Informers {
    client: Client,
    namespace: Option<String>,
    armans: InformerState<Arman>,
    deployments: InformerState<Deployment>,
    services: InformerState<Service>,
}

impl KubeCache {
    /// Create the cache for `namespace` (all namespaces when `None`).
    #[must_use]
    pub fn new(client: Client, namespace: Option<String>) -> (Self, Informers) {
        let armans = InformerState::new();
        let deployments = InformerState::new();
        let services = InformerState::new();

        let cache = Self {
            armans: armans.reader.clone(),
            deployments: deployments.reader.clone(),
            services: services.reader.clone(),
            armans_synced: armans.synced.clone(),
            deployments_synced: deployments.synced.clone(),
            services_synced: services.synced.clone(),
        };
        let informers = Informers {
            client,
            namespace,
            armans,
            deployments,
            services,
        };
        (cache, informers)
    }
}

impl CachedView for KubeCache {
    fn get_arman(&self, namespace: Option<&str>, name: &str) -> Option<Arc<Arman>> {
        let obj_ref = match namespace {
            Some(ns) => ObjectRef::new(name).within(ns),
            None => ObjectRef::new(name),
        };
        self.armans.get(&obj_ref)
    }

    fn get_deployment(&self, namespace: &str, name: &str) -> Option<Arc<Deployment>> {
        self.deployments.get(&ObjectRef::new(name).within(namespace))
    }

    fn get_service(&self, namespace: &str, name: &str) -> Option<Arc<Service>> {
        self.services.get(&ObjectRef::new(name).within(namespace))
    }

    fn has_synced(&self) -> bool {
        self.armans_synced.load(Ordering::SeqCst)
            && self.deployments_synced.load(Ordering::SeqCst)
            && self.services_synced.load(Ordering::SeqCst)
    }
}

impl Informers {
    /// Spawn one watch task per kind, delivering every change to `handler`.
    pub fn start(self, handler: EventHandler) -> Vec<JoinHandle<()>> {
        info!(
            namespace = self.namespace.as_deref().unwrap_or("<all>"),
            "Starting informers"
        );
        vec![
            tokio::spawn(run_informer(
                api(&self.client, self.namespace.as_deref()),
                self.armans,
                handler.clone(),
                ResourceEvent::Arman,
            )),
            tokio::spawn(run_informer(
                api(&self.client, self.namespace.as_deref()),
                self.deployments,
                handler.clone(),
                ResourceEvent::Deployment,
            )),
            tokio::spawn(run_informer(
                api(&self.client, self.namespace.as_deref()),
                self.services,
                handler,
                ResourceEvent::Service,
            )),
        ]
    }
}

fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

async fn run_informer<K>(
    api: Api<K>,
    mut state: InformerState<K>,
    handler: EventHandler,
    wrap: fn(Change<K>) -> ResourceEvent,
) where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let kind = K::kind(&());
    let mut stream = watcher::watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    while let Some(event) = stream.next().await {
        match event {
            Ok(event) => {
                for change in state.apply(event) {
                    handler(wrap(change));
                }
            }
            Err(e) => warn!(kind = %kind, "Watch error, retrying with backoff: {e}"),
        }
    }
    warn!(kind = %kind, "Watch stream ended");
}

/// Reflector store of one kind plus the bookkeeping needed to turn watch
/// events into add/update/delete notifications.
struct InformerState<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    writer: reflector::store::Writer<K>,
    reader: Store<K>,
    synced: Arc<AtomicBool>,
    /// Bookkeeping of the (re)list in progress, if any
    relist: Option<Relist<K>>,
}

/// Changes observed during a (re)list, held back until the store swaps in
/// the listed objects.
struct Relist<K>
where
    K: Resource<DynamicType = ()> + 'static,
{
    seen: HashSet<ObjectRef<K>>,
    pending: Vec<Change<K>>,
}

impl<K> Default for Relist<K>
where
    K: Resource<DynamicType = ()> + 'static,
{
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
            pending: Vec::new(),
        }
    }
}

impl<K> InformerState<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    fn new() -> Self {
        let writer = reflector::store::Writer::default();
        let reader = writer.as_reader();
        Self {
            writer,
            reader,
            synced: Arc::new(AtomicBool::new(false)),
            relist: None,
        }
    }

    /// Apply one watch event to the store and return the resulting changes.
    ///
    /// The previous version of an object is read before the store is updated,
    /// so updates carry both versions. Changes found during a (re)list are
    /// only returned at `InitDone`, once the store shows the listed objects,
    /// together with a deletion for every object the list no longer contains.
    fn apply(&mut self, event: Event<K>) -> Vec<Change<K>> {
        let changes = match &event {
            Event::Init => {
                self.relist = Some(Relist::default());
                Vec::new()
            }
            Event::InitApply(obj) => {
                let obj_ref = ObjectRef::from_obj(obj);
                let change = changed(self.reader.get(&obj_ref), obj);
                match self.relist.as_mut() {
                    Some(relist) => {
                        relist.seen.insert(obj_ref);
                        relist.pending.push(change);
                        Vec::new()
                    }
                    None => vec![change],
                }
            }
            Event::Apply(obj) => {
                let old = self.reader.get(&ObjectRef::from_obj(obj));
                vec![changed(old, obj)]
            }
            Event::Delete(obj) => vec![Change::Deleted(Arc::new(obj.clone()))],
            Event::InitDone => {
                let Relist { seen, mut pending } = self.relist.take().unwrap_or_default();
                pending.extend(
                    self.reader
                        .state()
                        .into_iter()
                        .filter(|obj| !seen.contains(&ObjectRef::from_obj(obj.as_ref())))
                        .map(Change::Deleted),
                );
                pending
            }
        };

        self.writer.apply_watcher_event(&event);

        if matches!(event, Event::InitDone) && !self.synced.swap(true, Ordering::SeqCst) {
            debug!(kind = %K::kind(&()), "Cache synced");
        }
        changes
    }
}

fn changed<K: Clone>(old: Option<Arc<K>>, new: &K) -> Change<K> {
    let new = Arc::new(new.clone());
    match old {
        Some(old) => Change::Updated { old, new },
        None => Change::Added(new),
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
