// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Static adoption: one fixed label set for every unlabeled object.

use crate::coordination::AdoptionObject;
use crate::crd::AdoptionStrategyType;
use crate::dynamic_cache::{describe_gvk, DynamicCache};
use crate::labels::merge_labels;
use crate::metrics;
use crate::reconcilers::status::set_condition;
use crate::reconcilers::writer::TargetWriter;
use crate::selector::Selector;
use crate::status_reasons::{
    CONDITION_STATUS_TRUE, CONDITION_TYPE_ACTIVE, REASON_STATIC_STRATEGY_APPLIED,
};
use anyhow::{Context as _, Result};
use kube::core::GroupVersionKind;
use kube::ResourceExt;
use tracing::info;

/// Labels every target object lacking all of the configured keys.
///
/// # Errors
///
/// Returns an error if listing or updating a target object fails.
pub async fn reconcile<K: AdoptionObject>(
    cache: &DynamicCache,
    targets: &dyn TargetWriter,
    object: &mut K,
    gvk: &GroupVersionKind,
) -> Result<()> {
    let strategy = &object.common_spec().strategy;
    if strategy.r#type != AdoptionStrategyType::Static {
        return Ok(());
    }
    let Some(labels) = strategy.static_.as_ref().map(|s| s.labels.clone()) else {
        return Ok(());
    };

    let selector = Selector::missing_all(labels.keys());
    let namespace = object.target_namespace();
    let candidates = cache
        .list(gvk, &selector, namespace.as_deref())
        .await
        .with_context(|| format!("listing {}", describe_gvk(gvk)))?;

    for mut target in candidates {
        if !merge_labels(target.labels_mut(), &labels) {
            continue;
        }
        let result = targets.update(gvk, &target).await;
        metrics::record_target_label_update(K::KIND, result.is_ok());
        result.context("setting labels")?;

        info!(
            "{} {} adopted {} {}",
            K::KIND,
            object.name_any(),
            gvk.kind,
            target.name_any()
        );
    }

    let generation = object.meta().generation;
    set_condition(
        object.conditions_mut(),
        CONDITION_TYPE_ACTIVE,
        CONDITION_STATUS_TRUE,
        REASON_STATIC_STRATEGY_APPLIED,
        "",
        generation,
    );
    Ok(())
}
