// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer and cache-label management.
//!
//! Every coordination object carries the cache-cleanup finalizer while it
//! holds dynamic watches. The deletion path releases the watches first and
//! only then removes the finalizer, so an interrupted deletion is retried
//! with the finalizer still in place.
//!
//! # Example
//!
//! ```rust,ignore
//! use package_coordination::reconcilers::finalizers::{
//!     ensure_finalizer, free_cache_and_remove_finalizer,
//! };
//!
//! async fn reconcile(engine: &Engine, mut adoption: Adoption) -> anyhow::Result<()> {
//!     if adoption.metadata.deletion_timestamp.is_some() {
//!         return free_cache_and_remove_finalizer(
//!             &engine.cache, engine.writer.as_ref(), &mut adoption, FINALIZER,
//!         ).await;
//!     }
//!     ensure_finalizer(engine.writer.as_ref(), &mut adoption, FINALIZER).await?;
//!     // Normal reconciliation logic...
//!     Ok(())
//! }
//! ```

use crate::config::OperatorConfig;
use crate::coordination::CoordinationObject;
use crate::dynamic_cache::DynamicCache;
use crate::reconcilers::writer::{CoordinationWriter, TargetWriter};
use anyhow::{Context as _, Result};
use kube::api::{DynamicObject, ObjectMeta};
use kube::core::{GroupVersionKind, TypeMeta};
use kube::ResourceExt;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::info;

/// True if `finalizer` is present on the object.
#[must_use]
pub fn has_finalizer<K: CoordinationObject>(object: &K, finalizer: &str) -> bool {
    object.finalizers().iter().any(|f| f == finalizer)
}

/// Add a finalizer if not already present.
///
/// The merge patch carries the object's resource version, so a concurrent
/// change fails with a conflict instead of dropping someone else's
/// finalizer. On success `object` reflects the stored finalizers and
/// resource version.
///
/// # Errors
///
/// Returns an error if the patch fails.
pub async fn ensure_finalizer<K: CoordinationObject>(
    writer: &dyn CoordinationWriter<K>,
    object: &mut K,
    finalizer: &str,
) -> Result<()> {
    if has_finalizer(object, finalizer) {
        return Ok(());
    }

    let mut finalizers = object.finalizers().to_vec();
    finalizers.push(finalizer.to_string());
    patch_finalizers(writer, object, finalizers).await?;

    info!(
        "Added finalizer {} to {} {}",
        finalizer,
        K::KIND,
        object.name_any()
    );
    Ok(())
}

/// Remove a finalizer if present.
///
/// # Errors
///
/// Returns an error if the patch fails.
pub async fn remove_finalizer<K: CoordinationObject>(
    writer: &dyn CoordinationWriter<K>,
    object: &mut K,
    finalizer: &str,
) -> Result<()> {
    if !has_finalizer(object, finalizer) {
        return Ok(());
    }

    let finalizers: Vec<String> = object
        .finalizers()
        .iter()
        .filter(|f| *f != finalizer)
        .cloned()
        .collect();
    patch_finalizers(writer, object, finalizers).await?;

    info!(
        "Removed finalizer {} from {} {}",
        finalizer,
        K::KIND,
        object.name_any()
    );
    Ok(())
}

async fn patch_finalizers<K: CoordinationObject>(
    writer: &dyn CoordinationWriter<K>,
    object: &mut K,
    finalizers: Vec<String>,
) -> Result<()> {
    let patch = json!({
        "metadata": {
            "finalizers": finalizers,
            "resourceVersion": object.resource_version(),
        }
    });
    let stored = writer.patch(object, &patch).await?;

    let meta = object.meta_mut();
    meta.finalizers = stored.meta().finalizers.clone();
    meta.resource_version = stored.meta().resource_version.clone();
    Ok(())
}

/// Release every dynamic watch held by `object`, then remove the finalizer.
///
/// If freeing the cache fails the finalizer stays, so the deletion is
/// retried on the next reconcile.
///
/// # Errors
///
/// Returns an error if the cache cannot be freed or the patch fails.
pub async fn free_cache_and_remove_finalizer<K: CoordinationObject>(
    cache: &DynamicCache,
    writer: &dyn CoordinationWriter<K>,
    object: &mut K,
    finalizer: &str,
) -> Result<()> {
    let owner = object.owner_reference();
    cache
        .free(&owner)
        .await
        .with_context(|| format!("freeing dynamic cache for {owner}"))?;

    remove_finalizer(writer, object, finalizer).await
}

/// Marks a target object as a member of the dynamic cache.
///
/// Uses server-side apply with forced ownership, so only the label itself is
/// claimed by the operator's field manager.
///
/// # Errors
///
/// Returns an error if the apply request fails.
pub async fn ensure_dynamic_cache_label(
    writer: &dyn TargetWriter,
    config: &OperatorConfig,
    gvk: &GroupVersionKind,
    object: &DynamicObject,
) -> Result<DynamicObject> {
    let labels = BTreeMap::from([(
        config.cache_label_key.clone(),
        config.cache_label_value.clone(),
    )]);
    writer
        .apply(gvk, &label_apply_object(gvk, object, Some(labels)), &config.field_manager)
        .await
}

/// Removes the dynamic cache label from a target object.
///
/// Applying a configuration without the label releases the operator's
/// ownership, which lets the API server drop the field.
///
/// # Errors
///
/// Returns an error if the apply request fails.
pub async fn remove_dynamic_cache_label(
    writer: &dyn TargetWriter,
    config: &OperatorConfig,
    gvk: &GroupVersionKind,
    object: &DynamicObject,
) -> Result<DynamicObject> {
    writer
        .apply(gvk, &label_apply_object(gvk, object, None), &config.field_manager)
        .await
}

fn label_apply_object(
    gvk: &GroupVersionKind,
    object: &DynamicObject,
    labels: Option<BTreeMap<String, String>>,
) -> DynamicObject {
    DynamicObject {
        types: Some(TypeMeta {
            api_version: gvk.api_version(),
            kind: gvk.kind.clone(),
        }),
        metadata: ObjectMeta {
            name: object.metadata.name.clone(),
            namespace: object.metadata.namespace.clone(),
            labels,
            ..ObjectMeta::default()
        },
        data: json!({}),
    }
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
