// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! On-demand watches for kinds discovered at runtime.
//!
//! Coordination objects name their target kind in the spec, so the operator
//! cannot set up typed watches at startup. The [`DynamicCache`] starts one
//! informer per `GroupVersionKind` the first time an owner asks for it, keeps
//! track of which owners depend on it, and stops it when the last owner
//! releases its references.
//!
//! # Architecture
//!
//! ```text
//!  reconcile ──watch(owner, gvk)──▶ DynamicCache ──start──▶ InformerFactory
//!      ▲                              │  owners: gvk → {owner}
//!      │                              │  informers: gvk → Informer
//!      │                              ▼
//!  Controller ◀─ObjectRef<K>─ enqueue ◀─CacheEvent─ EventDispatcher ◀─ informer task
//! ```
//!
//! Controllers subscribe through [`DynamicCache::source`] and map events back
//! to coordination objects with [`enqueue::enqueue_watching_objects`].

pub mod enqueue;
pub mod events;
pub mod informer;
#[cfg(test)]
pub mod testing;

pub use enqueue::enqueue_watching_objects;
pub use events::{CacheEvent, EventDispatcher};
pub use informer::{Informer, InformerFactory, KubeInformerFactory};

use crate::constants::CACHE_SYNC_TIMEOUT_SECS;
use crate::errors::CacheError;
use crate::metrics;
use crate::selector::Selector;
use futures::channel::mpsc::UnboundedReceiver;
use kube::api::DynamicObject;
use kube::core::{GroupVersionKind, TypeMeta};
use kube::runtime::reflector::Store;
use kube::{Resource, ResourceExt};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identity of a coordination object holding a watch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerReference {
    pub group: String,
    pub kind: String,
    pub uid: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl OwnerReference {
    /// Builds the reference for a typed resource.
    pub fn from_resource<K: Resource<DynamicType = ()>>(object: &K) -> Self {
        Self {
            group: K::group(&()).to_string(),
            kind: K::kind(&()).to_string(),
            uid: object.meta().uid.clone().unwrap_or_default(),
            name: object.name_any(),
            namespace: object.namespace(),
        }
    }
}

impl fmt::Display for OwnerReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}.{} {}/{}", self.kind, self.group, ns, self.name),
            None => write!(f, "{}.{} {}", self.kind, self.group, self.name),
        }
    }
}

/// Renders a GVK as `group/version, Kind=kind`.
#[must_use]
pub fn describe_gvk(gvk: &GroupVersionKind) -> String {
    format!("{}/{}, Kind={}", gvk.group, gvk.version, gvk.kind)
}

#[derive(Default)]
struct CacheState {
    owners: HashMap<GroupVersionKind, HashSet<OwnerReference>>,
    informers: HashMap<GroupVersionKind, Informer>,
}

/// Reference-counted informer multiplexer keyed by GVK.
pub struct DynamicCache {
    factory: Box<dyn InformerFactory>,
    dispatcher: EventDispatcher,
    state: Mutex<CacheState>,
}

impl DynamicCache {
    pub fn new(factory: impl InformerFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            dispatcher: EventDispatcher::default(),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Registers `owner` as interested in `gvk`, starting the informer on the
    /// first reference. Calling it again for the same pair is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::WatchStart`] when the informer cannot be started.
    pub async fn watch(&self, owner: &OwnerReference, gvk: &GroupVersionKind) -> Result<(), CacheError> {
        let mut state = self.state.lock().map_err(|e| CacheError::WatchStart {
            gvk: describe_gvk(gvk),
            reason: e.to_string(),
        })?;

        if !state.informers.contains_key(gvk) {
            let informer = self.factory.start(gvk, self.dispatcher.clone())?;
            state.informers.insert(gvk.clone(), informer);
            info!(gvk = %describe_gvk(gvk), owner = %owner, "Started dynamic watch");
            metrics::set_dynamic_cache_informers(state.informers.len());
        }

        if state.owners.entry(gvk.clone()).or_default().insert(owner.clone()) {
            debug!(gvk = %describe_gvk(gvk), owner = %owner, "Registered dynamic watch owner");
        }
        Ok(())
    }

    /// Removes `owner` from every kind it referenced. Kinds left without
    /// owners have their informer stopped.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::CacheFree`] if the owner registry is unusable.
    pub async fn free(&self, owner: &OwnerReference) -> Result<(), CacheError> {
        let mut guard = self.state.lock().map_err(|e| CacheError::CacheFree {
            owner: owner.to_string(),
            reason: e.to_string(),
        })?;
        let CacheState { owners, informers } = &mut *guard;

        owners.retain(|gvk, set| {
            set.remove(owner);
            if !set.is_empty() {
                return true;
            }
            if informers.remove(gvk).is_some() {
                info!(gvk = %describe_gvk(gvk), "releasing watcher");
                metrics::remove_dynamic_cache_objects(gvk);
            }
            false
        });
        metrics::set_dynamic_cache_informers(informers.len());
        Ok(())
    }

    /// Reads one object from the cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotCached`] if nobody watches `gvk`.
    pub async fn get(
        &self,
        gvk: &GroupVersionKind,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Option<DynamicObject>, CacheError> {
        let store = self.ready_store(gvk).await?;
        Ok(store
            .state()
            .into_iter()
            .find(|o| o.name_any() == name && o.namespace().as_deref() == namespace)
            .map(|o| with_type_meta(o.as_ref().clone(), gvk)))
    }

    /// Lists cached objects matching `selector`, optionally restricted to one
    /// namespace. Results are ordered by namespace and name.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotCached`] if nobody watches `gvk`.
    pub async fn list(
        &self,
        gvk: &GroupVersionKind,
        selector: &Selector,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>, CacheError> {
        let store = self.ready_store(gvk).await?;
        let mut objects: Vec<DynamicObject> = store
            .state()
            .into_iter()
            .filter(|o| namespace.is_none_or(|ns| o.namespace().as_deref() == Some(ns)))
            .filter(|o| selector.matches(o.labels()))
            .map(|o| with_type_meta(o.as_ref().clone(), gvk))
            .collect();
        objects.sort_by(|a, b| {
            (a.namespace(), a.name_any()).cmp(&(b.namespace(), b.name_any()))
        });
        Ok(objects)
    }

    /// Owners currently referencing `gvk`.
    #[must_use]
    pub fn owners_for_gvk(&self, gvk: &GroupVersionKind) -> Vec<OwnerReference> {
        let state = self.lock_state();
        let mut owners: Vec<OwnerReference> = state
            .owners
            .get(gvk)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        owners.sort();
        owners
    }

    /// New event stream carrying every change to every watched object.
    #[must_use]
    pub fn source(&self) -> UnboundedReceiver<CacheEvent> {
        self.dispatcher.subscribe()
    }

    #[must_use]
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// True while an informer for `gvk` is running.
    #[must_use]
    pub fn is_watching(&self, gvk: &GroupVersionKind) -> bool {
        self.lock_state().informers.contains_key(gvk)
    }

    /// Number of running informers.
    #[must_use]
    pub fn informer_count(&self) -> usize {
        self.lock_state().informers.len()
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn ready_store(&self, gvk: &GroupVersionKind) -> Result<Store<DynamicObject>, CacheError> {
        let store = self
            .lock_state()
            .informers
            .get(gvk)
            .map(Informer::store)
            .ok_or_else(|| CacheError::NotCached {
                gvk: describe_gvk(gvk),
            })?;

        let timeout = Duration::from_secs(CACHE_SYNC_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, store.wait_until_ready()).await {
            Ok(Ok(())) => Ok(store),
            Ok(Err(_)) => Err(CacheError::InformerStopped {
                gvk: describe_gvk(gvk),
            }),
            Err(_) => {
                warn!(gvk = %describe_gvk(gvk), "Dynamic informer has not synced yet");
                Err(CacheError::SyncTimeout {
                    gvk: describe_gvk(gvk),
                    seconds: CACHE_SYNC_TIMEOUT_SECS,
                })
            }
        }
    }
}

fn with_type_meta(mut object: DynamicObject, gvk: &GroupVersionKind) -> DynamicObject {
    if object.types.is_none() {
        object.types = Some(TypeMeta {
            api_version: gvk.api_version(),
            kind: gvk.kind.clone(),
        });
    }
    object
}

#[cfg(test)]
#[path = "dynamic_cache_tests.rs"]
mod dynamic_cache_tests;
