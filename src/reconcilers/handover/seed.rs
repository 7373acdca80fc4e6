// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Stamps the initial label value on target objects that have none, so they
//! become candidates of the relabel pass.

use crate::coordination::HandoverObject;
use crate::crd::HandoverStrategyType;
use crate::dynamic_cache::{describe_gvk, DynamicCache};
use crate::metrics;
use crate::reconcilers::writer::TargetWriter;
use crate::selector::{Requirement, Selector};
use anyhow::{Context as _, Result};
use kube::core::GroupVersionKind;
use kube::ResourceExt;
use tracing::info;

/// Labels every target object lacking the handover label key with the
/// initial value. Returns whether any object was updated.
///
/// # Errors
///
/// Returns an error if listing or updating a target object fails.
pub async fn adopt_unlabeled<K: HandoverObject>(
    cache: &DynamicCache,
    targets: &dyn TargetWriter,
    object: &K,
    gvk: &GroupVersionKind,
) -> Result<bool> {
    let strategy = &object.handover_spec().strategy;
    if strategy.r#type != HandoverStrategyType::Relabel {
        return Ok(false);
    }
    let Some(relabel) = strategy.relabel.as_ref() else {
        return Ok(false);
    };

    let selector = Selector::from_requirements([Requirement::does_not_exist(
        relabel.label_key.clone(),
    )]);
    let namespace = object.namespace();
    let unlabeled = cache
        .list(gvk, &selector, namespace.as_deref())
        .await
        .with_context(|| format!("listing {}", describe_gvk(gvk)))?;

    let mut seeded = false;
    for mut target in unlabeled {
        target
            .labels_mut()
            .insert(relabel.label_key.clone(), relabel.initial_value.clone());

        let result = targets.update(gvk, &target).await;
        metrics::record_target_label_update(K::KIND, result.is_ok());
        result.context("setting initial label")?;

        info!(
            "{} {} set {}={} on {} {}",
            K::KIND,
            object.name_any(),
            relabel.label_key,
            relabel.initial_value,
            gvk.kind,
            target.name_any()
        );
        seeded = true;
    }
    Ok(seeded)
}
