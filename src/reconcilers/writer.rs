// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Write paths of the reconcilers.
//!
//! Reads go through the dynamic cache; every write goes through one of the
//! traits below so the engines can be driven by in-memory fakes in tests.

use crate::coordination::CoordinationObject;
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject, Patch, PatchParams, PostParams};
use kube::core::GroupVersionKind;
use kube::{Api, Client, ResourceExt};
use serde_json::Value;
use tracing::debug;

/// Writes to target objects of kinds discovered at runtime.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Replaces `object`. The request carries the object's resource version,
    /// so a concurrent change surfaces as a conflict.
    async fn update(&self, gvk: &GroupVersionKind, object: &DynamicObject) -> Result<DynamicObject>;

    /// Server-side applies `object` with forced ownership.
    async fn apply(
        &self,
        gvk: &GroupVersionKind,
        object: &DynamicObject,
        field_manager: &str,
    ) -> Result<DynamicObject>;
}

/// Writes to coordination objects of kind `K`.
#[async_trait]
pub trait CoordinationWriter<K: CoordinationObject>: Send + Sync {
    /// Merge-patches the object and returns the stored result.
    async fn patch(&self, object: &K, patch: &Value) -> Result<K>;

    /// Merge-patches the status subresource.
    async fn patch_status(&self, object: &K, patch: &Value) -> Result<()>;
}

/// Writer backed by the API server.
#[derive(Clone)]
pub struct KubeWriter {
    client: Client,
}

impl KubeWriter {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn dynamic_api(&self, gvk: &GroupVersionKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let api_resource = ApiResource::from_gvk(gvk);
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &api_resource),
            None => Api::all_with(self.client.clone(), &api_resource),
        }
    }
}

#[async_trait]
impl TargetWriter for KubeWriter {
    async fn update(&self, gvk: &GroupVersionKind, object: &DynamicObject) -> Result<DynamicObject> {
        let name = object.name_any();
        let namespace = object.namespace();
        debug!(kind = %gvk.kind, name = %name, namespace = ?namespace, "Updating target object");

        self.dynamic_api(gvk, namespace.as_deref())
            .replace(&name, &PostParams::default(), object)
            .await
            .with_context(|| format!("updating {} {}", gvk.kind, name))
    }

    async fn apply(
        &self,
        gvk: &GroupVersionKind,
        object: &DynamicObject,
        field_manager: &str,
    ) -> Result<DynamicObject> {
        let name = object.name_any();
        let namespace = object.namespace();
        debug!(kind = %gvk.kind, name = %name, namespace = ?namespace, "Applying target object");

        self.dynamic_api(gvk, namespace.as_deref())
            .patch(
                &name,
                &PatchParams::apply(field_manager).force(),
                &Patch::Apply(object),
            )
            .await
            .with_context(|| format!("applying {} {}", gvk.kind, name))
    }
}

#[async_trait]
impl<K: CoordinationObject> CoordinationWriter<K> for KubeWriter {
    async fn patch(&self, object: &K, patch: &Value) -> Result<K> {
        let name = object.name_any();
        K::api(self.client.clone(), object.namespace().as_deref())
            .patch(&name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .with_context(|| format!("patching {} {}", K::KIND, name))
    }

    async fn patch_status(&self, object: &K, patch: &Value) -> Result<()> {
        let name = object.name_any();
        K::api(self.client.clone(), object.namespace().as_deref())
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .with_context(|| format!("updating {} {} status", K::KIND, name))?;
        Ok(())
    }
}
