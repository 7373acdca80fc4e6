// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Round-robin adoption: hands out label options in turn.
//!
//! The index of the last option handed out is kept in
//! `.status.roundRobin.lastIndex`, so distribution continues where it left
//! off across reconciles. Only keys from the options decide whether an
//! object is still unlabeled; the `always` labels do not.

use crate::coordination::AdoptionObject;
use crate::crd::{AdoptionRoundRobinStatus, AdoptionStrategyType};
use crate::dynamic_cache::{describe_gvk, DynamicCache};
use crate::labels::merge_labels;
use crate::metrics;
use crate::reconcilers::status::set_condition;
use crate::reconcilers::writer::TargetWriter;
use crate::selector::Selector;
use crate::status_reasons::{
    CONDITION_STATUS_TRUE, CONDITION_TYPE_ACTIVE, REASON_ROUND_ROBIN_STRATEGY_APPLIED,
};
use anyhow::{Context as _, Result};
use kube::core::GroupVersionKind;
use kube::ResourceExt;
use tracing::{debug, info};

/// Index following `last` in a list of `len` options, wrapping to zero.
#[must_use]
pub fn next_index(last: i64, len: usize) -> usize {
    let next = last.saturating_add(1);
    match usize::try_from(next) {
        Ok(next) if next < len => next,
        _ => 0,
    }
}

/// Last committed index, `-1` if none.
fn last_index<K: AdoptionObject>(object: &K) -> i64 {
    object
        .adoption_status()
        .and_then(|s| s.round_robin.as_ref())
        .map_or(-1, |rr| rr.last_index)
}

fn set_last_index<K: AdoptionObject>(object: &mut K, index: i64) {
    object.adoption_status_mut().round_robin = Some(AdoptionRoundRobinStatus { last_index: index });
}

/// Distributes the options over every unlabeled target object.
///
/// # Errors
///
/// Returns an error if listing or updating a target object fails. On a
/// failed update the status keeps the last index that was committed.
pub async fn reconcile<K: AdoptionObject>(
    cache: &DynamicCache,
    targets: &dyn TargetWriter,
    object: &mut K,
    gvk: &GroupVersionKind,
) -> Result<()> {
    let strategy = &object.common_spec().strategy;
    if strategy.r#type != AdoptionStrategyType::RoundRobin {
        if object.adoption_status().is_some_and(|s| s.round_robin.is_some()) {
            debug!("Clearing round-robin status of {} {}", K::KIND, object.name_any());
        }
        object.adoption_status_mut().round_robin = None;
        return Ok(());
    }
    let Some(spec) = strategy.round_robin.clone() else {
        return Ok(());
    };
    if spec.options.is_empty() {
        return Ok(());
    }

    let selector = Selector::missing_all(spec.options.iter().flat_map(|option| option.keys()));
    let namespace = object.target_namespace();
    let candidates = cache
        .list(gvk, &selector, namespace.as_deref())
        .await
        .with_context(|| format!("listing {}", describe_gvk(gvk)))?;

    for mut target in candidates {
        let last = last_index(object);
        let next = next_index(last, spec.options.len());

        let labels = target.labels_mut();
        merge_labels(labels, &spec.always);
        merge_labels(labels, &spec.options[next]);

        let result = targets.update(gvk, &target).await;
        metrics::record_target_label_update(K::KIND, result.is_ok());
        if let Err(err) = result {
            set_last_index(object, last);
            return Err(err.context("setting labels"));
        }

        info!(
            "{} {} assigned option {} to {} {}",
            K::KIND,
            object.name_any(),
            next,
            gvk.kind,
            target.name_any()
        );
        set_last_index(object, i64::try_from(next).unwrap_or_default());
    }

    let generation = object.meta().generation;
    set_condition(
        object.conditions_mut(),
        CONDITION_TYPE_ACTIVE,
        CONDITION_STATUS_TRUE,
        REASON_ROUND_ROBIN_STRATEGY_APPLIED,
        "",
        generation,
    );
    Ok(())
}
