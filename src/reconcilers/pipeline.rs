// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Steps shared by every coordination reconcile.
//!
//! ```text
//! deletion? ──yes──▶ free cache ─▶ remove finalizer ─▶ done
//!    │no
//!    ▼
//! ensure finalizer ─▶ validate spec ──invalid──▶ condition + status ─▶ done
//!                          │ok
//!                          ▼
//!                    watch target kind ─▶ strategies ─▶ status
//! ```

use crate::config::OperatorConfig;
use crate::coordination::CoordinationObject;
use crate::dynamic_cache::{describe_gvk, DynamicCache};
use crate::metrics;
use crate::reconcilers::finalizers::{ensure_finalizer, free_cache_and_remove_finalizer};
use crate::reconcilers::status::set_condition;
use crate::reconcilers::writer::CoordinationWriter;
use crate::status_reasons::{CONDITION_STATUS_FALSE, REASON_INVALID_SPEC};
use anyhow::{Context as _, Result};
use kube::core::GroupVersionKind;
use kube::ResourceExt;
use tracing::{info, warn};

/// Outcome of the steps preceding the strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    /// The object was being deleted and has been released.
    Deleted,
    /// The spec is invalid; the condition has been reported.
    Invalid,
    /// Strategies may run against the watched target kind.
    Ready(GroupVersionKind),
}

/// Runs deletion handling, finalizer, validation and the dynamic watch.
///
/// # Errors
///
/// Returns an error if a patch, the cache release or the watch fails.
pub async fn prepare<K: CoordinationObject>(
    cache: &DynamicCache,
    writer: &dyn CoordinationWriter<K>,
    config: &OperatorConfig,
    object: &mut K,
) -> Result<Prepared> {
    if object.meta().deletion_timestamp.is_some() {
        info!("{} {} is being deleted", K::KIND, object.name_any());
        free_cache_and_remove_finalizer(cache, writer, object, &config.cached_finalizer).await?;
        return Ok(Prepared::Deleted);
    }

    ensure_finalizer(writer, object, &config.cached_finalizer).await?;

    if let Err(err) = object.validate() {
        warn!("{} {} has an invalid spec: {}", K::KIND, object.name_any(), err);
        metrics::record_error(K::KIND, "invalid_spec");
        let generation = object.meta().generation;
        set_condition(
            object.conditions_mut(),
            K::TERMINAL_CONDITION,
            CONDITION_STATUS_FALSE,
            REASON_INVALID_SPEC,
            &err.to_string(),
            generation,
        );
        write_status(writer, object).await?;
        return Ok(Prepared::Invalid);
    }

    let gvk = object.target_api().gvk();
    let owner = object.owner_reference();
    cache
        .watch(&owner, &gvk)
        .await
        .with_context(|| format!("watching {}", describe_gvk(&gvk)))?;

    Ok(Prepared::Ready(gvk))
}

/// Mirrors conditions into the phase and persists the status.
///
/// # Errors
///
/// Returns an error if the status patch fails.
pub async fn write_status<K: CoordinationObject>(
    writer: &dyn CoordinationWriter<K>,
    object: &mut K,
) -> Result<()> {
    object.update_phase();
    let generation = object.meta().generation;
    object.set_observed_generation(generation);

    let patch = object
        .status_patch()
        .with_context(|| format!("serializing {} status", K::KIND))?;
    writer.patch_status(object, &patch).await
}

/// Persists status after the strategies ran, then reports the first error.
///
/// The status write is attempted even when the strategies failed so partial
/// progress is kept.
///
/// # Errors
///
/// Returns the strategy error if there was one, else any status write error.
pub async fn finish<K: CoordinationObject>(
    writer: &dyn CoordinationWriter<K>,
    object: &mut K,
    outcome: Result<()>,
) -> Result<()> {
    let written = write_status(writer, object).await;
    match (outcome, written) {
        (Err(err), Err(status_err)) => {
            warn!(
                "Failed to record status of {} {} after error: {:#}",
                K::KIND,
                object.name_any(),
                status_err
            );
            Err(err)
        }
        (Err(err), Ok(())) => Err(err),
        (Ok(()), written) => written,
    }
}
