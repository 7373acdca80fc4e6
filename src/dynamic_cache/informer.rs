// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Informers backing the dynamic cache.
//!
//! An [`Informer`] pairs a reflector store with the task feeding it. The
//! task is aborted when the informer is dropped, so removing an informer
//! from the cache stops its watch and releases its objects.

use super::events::{CacheEvent, EventDispatcher};
use crate::errors::CacheError;
use crate::metrics;
use futures::StreamExt;
use kube::api::{ApiResource, DynamicObject};
use kube::core::GroupVersionKind;
use kube::runtime::reflector::{self, store::Writer, Store};
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Read side of a running watch.
pub struct Informer {
    store: Store<DynamicObject>,
    task: Option<JoinHandle<()>>,
}

impl Informer {
    /// Informer whose store is fed by `task`.
    #[must_use]
    pub fn new(store: Store<DynamicObject>, task: JoinHandle<()>) -> Self {
        Self {
            store,
            task: Some(task),
        }
    }

    /// Informer over a store that is fed externally.
    #[must_use]
    pub fn from_store(store: Store<DynamicObject>) -> Self {
        Self { store, task: None }
    }

    #[must_use]
    pub fn store(&self) -> Store<DynamicObject> {
        self.store.clone()
    }
}

impl Drop for Informer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Starts informers for kinds discovered at runtime.
pub trait InformerFactory: Send + Sync {
    /// Starts watching `gvk`. Events for every object of the kind are handed
    /// to `dispatcher`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::WatchStart`] if the watch cannot be set up.
    fn start(&self, gvk: &GroupVersionKind, dispatcher: EventDispatcher)
        -> Result<Informer, CacheError>;
}

/// Informer factory watching the API server across all namespaces.
#[derive(Clone)]
pub struct KubeInformerFactory {
    client: Client,
}

impl KubeInformerFactory {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl InformerFactory for KubeInformerFactory {
    fn start(
        &self,
        gvk: &GroupVersionKind,
        dispatcher: EventDispatcher,
    ) -> Result<Informer, CacheError> {
        if gvk.version.is_empty() || gvk.kind.is_empty() {
            return Err(CacheError::WatchStart {
                gvk: format!("{gvk:?}"),
                reason: "version and kind must not be empty".to_string(),
            });
        }

        let api_resource = ApiResource::from_gvk(gvk);
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &api_resource);
        let writer = Writer::new(api_resource);
        let store = writer.as_reader();
        let counted = store.clone();
        let gvk = gvk.clone();

        let stream = reflector::reflector(
            writer,
            watcher::watcher(api, watcher::Config::default()).default_backoff(),
        );

        let task = tokio::spawn(async move {
            debug!(gvk = ?gvk, "Starting dynamic informer");
            stream
                .for_each(|event| {
                    match event {
                        Ok(Event::Apply(object) | Event::Delete(object) | Event::InitApply(object)) => {
                            dispatcher.dispatch(&CacheEvent {
                                gvk: gvk.clone(),
                                object: Arc::new(object),
                            });
                            metrics::set_dynamic_cache_objects(&gvk, counted.state().len());
                        }
                        Ok(Event::Init | Event::InitDone) => {
                            metrics::set_dynamic_cache_objects(&gvk, counted.state().len());
                        }
                        Err(e) => {
                            warn!(gvk = ?gvk, error = %e, "Dynamic informer watch error");
                        }
                    }
                    futures::future::ready(())
                })
                .await;
        });

        Ok(Informer::new(store, task))
    }
}
