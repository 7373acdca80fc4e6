// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory writers and a harness for driving the engines in unit tests.
//!
//! Target updates are fed back into the fake informer factory, so the next
//! reconcile pass reads them from the dynamic cache like a live watch would.

use crate::config::OperatorConfig;
use crate::coordination::CoordinationObject;
use crate::dynamic_cache::testing::FakeInformerFactory;
use crate::dynamic_cache::DynamicCache;
use crate::reconcilers::writer::{CoordinationWriter, TargetWriter};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use kube::ResourceExt;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct TargetState {
    updates: Vec<DynamicObject>,
    applies: Vec<(DynamicObject, String)>,
    failing_names: HashSet<String>,
    fail_after: Option<usize>,
}

/// Target writer storing updates in a [`FakeInformerFactory`].
pub struct FakeTargetWriter {
    factory: FakeInformerFactory,
    state: Mutex<TargetState>,
}

impl FakeTargetWriter {
    pub fn new(factory: FakeInformerFactory) -> Self {
        Self {
            factory,
            state: Mutex::new(TargetState::default()),
        }
    }

    /// Fails every update of objects called `name`.
    pub fn fail_updates_of(&self, name: &str) {
        self.state.lock().unwrap().failing_names.insert(name.to_string());
    }

    /// Lets `count` more updates succeed, then fails the rest.
    pub fn fail_after(&self, count: usize) {
        let mut state = self.state.lock().unwrap();
        state.fail_after = Some(state.updates.len() + count);
    }

    /// Successful updates, in order.
    pub fn updates(&self) -> Vec<DynamicObject> {
        self.state.lock().unwrap().updates.clone()
    }

    /// Labels of every successful update, in order.
    pub fn updated_labels(&self) -> Vec<BTreeMap<String, String>> {
        self.updates().iter().map(|o| o.labels().clone()).collect()
    }

    /// Names of every successful update, in order.
    pub fn updated_names(&self) -> Vec<String> {
        self.updates().iter().map(ResourceExt::name_any).collect()
    }

    /// Server-side apply requests with their field manager.
    pub fn applies(&self) -> Vec<(DynamicObject, String)> {
        self.state.lock().unwrap().applies.clone()
    }
}

#[async_trait]
impl TargetWriter for FakeTargetWriter {
    async fn update(&self, gvk: &GroupVersionKind, object: &DynamicObject) -> Result<DynamicObject> {
        let name = object.name_any();
        {
            let state = self.state.lock().unwrap();
            if state.failing_names.contains(&name)
                || state.fail_after.is_some_and(|limit| state.updates.len() >= limit)
            {
                return Err(anyhow!("updating {} {}: conflict", gvk.kind, name));
            }
        }

        let mut stored = object.clone();
        let version = stored
            .resource_version()
            .and_then(|rv| rv.parse::<u64>().ok())
            .unwrap_or_default();
        stored.metadata.resource_version = Some((version + 1).to_string());

        self.factory.apply(gvk, stored.clone());
        self.state.lock().unwrap().updates.push(stored.clone());
        Ok(stored)
    }

    async fn apply(
        &self,
        _gvk: &GroupVersionKind,
        object: &DynamicObject,
        field_manager: &str,
    ) -> Result<DynamicObject> {
        self.state
            .lock()
            .unwrap()
            .applies
            .push((object.clone(), field_manager.to_string()));
        Ok(object.clone())
    }
}

/// JSON merge patch as the API server applies it.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        for (key, value) in patch {
            if value.is_null() {
                map.remove(key);
            } else {
                merge_patch(map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

struct CoordinationState {
    stored: Option<Value>,
    patches: Vec<Value>,
    status_patches: Vec<Value>,
}

/// Coordination writer keeping the stored object as JSON.
pub struct FakeCoordinationWriter<K> {
    state: Mutex<CoordinationState>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: CoordinationObject> FakeCoordinationWriter<K> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CoordinationState {
                stored: None,
                patches: Vec::new(),
                status_patches: Vec::new(),
            }),
            _kind: PhantomData,
        }
    }

    /// The object as stored after every patch so far.
    pub fn stored(&self) -> Option<K> {
        let state = self.state.lock().unwrap();
        state
            .stored
            .clone()
            .map(|v| serde_json::from_value(v).unwrap())
    }

    pub fn patches(&self) -> Vec<Value> {
        self.state.lock().unwrap().patches.clone()
    }

    pub fn status_patches(&self) -> Vec<Value> {
        self.state.lock().unwrap().status_patches.clone()
    }

    fn merge(&self, object: &K, patch: &Value) -> Value {
        let mut state = self.state.lock().unwrap();
        let mut stored = state
            .stored
            .take()
            .unwrap_or_else(|| serde_json::to_value(object).unwrap());
        merge_patch(&mut stored, patch);
        state.stored = Some(stored.clone());
        stored
    }
}

#[async_trait]
impl<K: CoordinationObject> CoordinationWriter<K> for FakeCoordinationWriter<K> {
    async fn patch(&self, object: &K, patch: &Value) -> Result<K> {
        self.state.lock().unwrap().patches.push(patch.clone());
        let stored = self.merge(object, patch);
        Ok(serde_json::from_value(stored)?)
    }

    async fn patch_status(&self, object: &K, patch: &Value) -> Result<()> {
        self.state.lock().unwrap().status_patches.push(patch.clone());
        self.merge(object, patch);
        Ok(())
    }
}

/// Cache, fake cluster and writers wired together for one test.
pub struct Harness<K: CoordinationObject> {
    pub factory: FakeInformerFactory,
    pub cache: Arc<DynamicCache>,
    pub targets: Arc<FakeTargetWriter>,
    pub writer: Arc<FakeCoordinationWriter<K>>,
    pub config: OperatorConfig,
}

impl<K: CoordinationObject> Harness<K> {
    pub fn new() -> Self {
        let factory = FakeInformerFactory::new();
        Self {
            cache: Arc::new(DynamicCache::new(factory.clone())),
            targets: Arc::new(FakeTargetWriter::new(factory.clone())),
            writer: Arc::new(FakeCoordinationWriter::new()),
            config: OperatorConfig::default(),
            factory,
        }
    }

    /// Adds objects to the fake cluster.
    pub fn seed(&self, gvk: &GroupVersionKind, objects: impl IntoIterator<Item = DynamicObject>) {
        for object in objects {
            self.factory.apply(gvk, object);
        }
    }

    /// Labels of an object as the fake cluster currently stores it.
    pub fn labels_of(
        &self,
        gvk: &GroupVersionKind,
        name: &str,
        namespace: Option<&str>,
    ) -> BTreeMap<String, String> {
        self.factory
            .object(gvk, name, namespace)
            .map(|o| o.labels().clone())
            .unwrap_or_default()
    }
}
