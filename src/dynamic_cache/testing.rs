// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory informer factory for unit tests.
//!
//! Objects are kept per kind and replayed into a fresh reflector store every
//! time the cache starts an informer. Changes made after a start are applied
//! to the live store and dispatched like a real watch event.

use super::{CacheEvent, EventDispatcher, Informer, InformerFactory};
use crate::errors::CacheError;
use kube::api::{ApiResource, DynamicObject, ObjectMeta};
use kube::core::{GroupVersionKind, TypeMeta};
use kube::runtime::reflector::store::Writer;
use kube::runtime::watcher::Event;
use kube::ResourceExt;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeState {
    objects: HashMap<GroupVersionKind, BTreeMap<(Option<String>, String), DynamicObject>>,
    writers: HashMap<GroupVersionKind, (Writer<DynamicObject>, EventDispatcher)>,
    starts: Vec<GroupVersionKind>,
    failing: bool,
    unsynced: bool,
}

#[derive(Clone, Default)]
pub struct FakeInformerFactory {
    state: Arc<Mutex<FakeState>>,
}

impl FakeInformerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `start` fail.
    pub fn fail_starts(&self) {
        self.state.lock().unwrap().failing = true;
    }

    /// Leaves every following informer in its initial list, as if the API
    /// server never answered.
    pub fn hold_sync(&self) {
        self.state.lock().unwrap().unsynced = true;
    }

    /// Kinds started so far, in order, including restarts.
    pub fn starts(&self) -> Vec<GroupVersionKind> {
        self.state.lock().unwrap().starts.clone()
    }

    /// Adds or replaces an object, feeding the live store when one is running.
    pub fn apply(&self, gvk: &GroupVersionKind, object: DynamicObject) {
        let mut state = self.state.lock().unwrap();
        let key = (object.namespace(), object.name_any());
        state
            .objects
            .entry(gvk.clone())
            .or_default()
            .insert(key, object.clone());

        if let Some((writer, dispatcher)) = state.writers.get_mut(gvk) {
            writer.apply_watcher_event(&Event::Apply(object.clone()));
            dispatcher.dispatch(&CacheEvent {
                gvk: gvk.clone(),
                object: Arc::new(object),
            });
        }
    }

    /// Current version of an object as the fake cluster sees it.
    pub fn object(&self, gvk: &GroupVersionKind, name: &str, namespace: Option<&str>) -> Option<DynamicObject> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(gvk)?
            .get(&(namespace.map(str::to_string), name.to_string()))
            .cloned()
    }
}

impl InformerFactory for FakeInformerFactory {
    fn start(&self, gvk: &GroupVersionKind, dispatcher: EventDispatcher) -> Result<Informer, CacheError> {
        let mut state = self.state.lock().unwrap();
        if state.failing {
            return Err(CacheError::WatchStart {
                gvk: super::describe_gvk(gvk),
                reason: "fake failure".to_string(),
            });
        }
        state.starts.push(gvk.clone());

        let mut writer = Writer::new(ApiResource::from_gvk(gvk));
        if !state.unsynced {
            writer.apply_watcher_event(&Event::Init);
            for object in state.objects.get(gvk).into_iter().flat_map(BTreeMap::values) {
                writer.apply_watcher_event(&Event::InitApply(object.clone()));
            }
            writer.apply_watcher_event(&Event::InitDone);
        }

        let store = writer.as_reader();
        state.writers.insert(gvk.clone(), (writer, dispatcher));
        Ok(Informer::from_store(store))
    }
}

/// Builds a target object of `gvk` with the given labels and extra fields.
pub fn target_object(
    gvk: &GroupVersionKind,
    name: &str,
    namespace: Option<&str>,
    labels: &[(&str, &str)],
    data: Value,
) -> DynamicObject {
    let labels: BTreeMap<String, String> = labels
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    DynamicObject {
        types: Some(TypeMeta {
            api_version: gvk.api_version(),
            kind: gvk.kind.clone(),
        }),
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: namespace.map(str::to_string),
            uid: Some(format!("uid-{}-{name}", namespace.unwrap_or("cluster"))),
            generation: Some(1),
            resource_version: Some("1".to_string()),
            labels: (!labels.is_empty()).then_some(labels),
            ..Default::default()
        },
        data,
    }
}
