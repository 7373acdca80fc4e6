// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Relabel handover.
//!
//! Moves target objects from `initialValue` to `toValue` of one label key.
//! New objects only enter `.status.processing` while the processing set plus
//! every found object failing its availability probes stays below
//! `maxUnavailable`. An in-flight object that is still unavailable counts
//! twice, so the set does not grow until it recovers.
//!
//! A processing entry is settled once the object reports the new value at
//! `observedLabelValuePath` and passes its probes. Objects that disappear,
//! or were replaced by a new object of the same name, are dropped.

use crate::coordination::HandoverObject;
use crate::crd::{
    HandoverCountsStatus, HandoverPartitionStatus, HandoverRefStatus, HandoverStrategyRelabelSpec,
    HandoverStrategyType,
};
use crate::dynamic_cache::{describe_gvk, DynamicCache};
use crate::metrics;
use crate::probing::Prober;
use crate::reconcilers::handover::partition::order_partitions;
use crate::reconcilers::status::set_condition;
use crate::reconcilers::writer::TargetWriter;
use crate::selector::{Requirement, Selector};
use crate::status_reasons::{
    CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, CONDITION_TYPE_COMPLETED, MESSAGE_COMPLETE,
    MESSAGE_INCOMPLETE, REASON_COMPLETE, REASON_INCOMPLETE,
};
use crate::unstructured::{resolve_path, to_unstructured, value_to_string};
use anyhow::{bail, Context as _, Result};
use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use kube::ResourceExt;
use tracing::{debug, info};

/// A listed target object with its probe outcome.
struct Candidate {
    object: DynamicObject,
    available: bool,
}

impl Candidate {
    fn label(&self, key: &str) -> Option<&str> {
        self.object.labels().get(key).map(String::as_str)
    }

    fn uid(&self) -> String {
        self.object.uid().unwrap_or_default()
    }
}

/// Shared inputs of one relabel pass.
struct Relabel<'a> {
    cache: &'a DynamicCache,
    targets: &'a dyn TargetWriter,
    gvk: &'a GroupVersionKind,
    spec: &'a HandoverStrategyRelabelSpec,
    prober: &'a dyn Prober,
    resource_type: &'static str,
}

impl Relabel<'_> {
    fn is_available(&self, object: &DynamicObject) -> bool {
        let result = self.prober.probe(&to_unstructured(object, self.gvk));
        if !result.success {
            debug!(
                "{} {} is unavailable: {}",
                self.gvk.kind,
                object.name_any(),
                result.message()
            );
        }
        result.success
    }

    /// Switches the label from the initial to the new value if it still
    /// carries the initial one.
    async fn relabel(&self, target: &mut DynamicObject) -> Result<()> {
        let key = &self.spec.label_key;
        if target.labels().get(key) != Some(&self.spec.initial_value) {
            return Ok(());
        }
        target
            .labels_mut()
            .insert(key.clone(), self.spec.to_value.clone());

        let result = self.targets.update(self.gvk, target).await;
        metrics::record_target_label_update(self.resource_type, result.is_ok());
        result.with_context(|| format!("updating {} {} in processing set", self.gvk.kind, target.name_any()))?;

        info!(
            "Relabeled {} {} to {}={}",
            self.gvk.kind,
            target.name_any(),
            key,
            self.spec.to_value
        );
        Ok(())
    }

    /// Advances one processing entry. Returns true once the entry is done.
    async fn settle(&self, entry: &HandoverRefStatus) -> Result<bool> {
        let found = self
            .cache
            .get(self.gvk, &entry.name, entry.namespace.as_deref())
            .await
            .context("getting object in processing set")?;
        let Some(mut target) = found else {
            debug!("{} {} left the processing set: gone", self.gvk.kind, entry.name);
            return Ok(true);
        };
        if target.uid().unwrap_or_default() != entry.uid {
            debug!("{} {} left the processing set: replaced", self.gvk.kind, entry.name);
            return Ok(true);
        }

        self.relabel(&mut target).await?;

        let value = to_unstructured(&target, self.gvk);
        let observed = resolve_path(&value, &self.spec.observed_label_value_path)
            .context("reading observed label value")?;
        match observed.as_slice() {
            [] => return Ok(false),
            [single] if single.as_str() == Some(self.spec.to_value.as_str()) => {}
            [_] => {
                info!("Waiting for status field of {} {} to update", self.gvk.kind, entry.name);
                return Ok(false);
            }
            many => {
                let rendered: Vec<String> = many.iter().map(|v| value_to_string(v)).collect();
                bail!("multiple status values returned: {}", rendered.join(", "));
            }
        }

        let result = self.prober.probe(&value);
        if !result.success {
            info!(
                "Waiting for {} {} to be ready: {}",
                self.gvk.kind,
                entry.name,
                result.message()
            );
            return Ok(false);
        }
        Ok(true)
    }

    fn counts<'c>(&self, candidates: impl IntoIterator<Item = &'c Candidate>) -> HandoverCountsStatus {
        let mut counts = HandoverCountsStatus::default();
        for candidate in candidates {
            counts.found += 1;
            if candidate.available {
                counts.available += 1;
            }
            if candidate.label(&self.spec.label_key) == Some(self.spec.to_value.as_str()) {
                counts.updated += 1;
            }
        }
        counts
    }

    fn is_old(&self, candidate: &Candidate) -> bool {
        candidate.label(&self.spec.label_key) == Some(self.spec.initial_value.as_str())
    }
}

/// Budget-bounded growth of the processing set.
struct Queue {
    processing: Vec<HandoverRefStatus>,
    added: Vec<DynamicObject>,
    max_unavailable: usize,
    unavailable: usize,
}

impl Queue {
    fn fill<'c>(&mut self, old: impl IntoIterator<Item = &'c Candidate>) {
        for candidate in old {
            if self.processing.len() + self.unavailable >= self.max_unavailable {
                break;
            }
            let uid = candidate.uid();
            if self.processing.iter().any(|entry| entry.uid == uid) {
                continue;
            }
            self.processing.push(HandoverRefStatus {
                uid,
                name: candidate.object.name_any(),
                namespace: candidate.object.namespace(),
            });
            self.added.push(candidate.object.clone());
        }
    }
}

/// Runs one relabel pass and records counts, processing set and the
/// `Completed` condition in the object's status.
///
/// # Errors
///
/// Returns an error if a cache read or a target update fails. Processing
/// entries that were not settled yet are kept in the status.
pub async fn reconcile<K: HandoverObject>(
    cache: &DynamicCache,
    targets: &dyn TargetWriter,
    object: &mut K,
    gvk: &GroupVersionKind,
    prober: &dyn Prober,
) -> Result<()> {
    let handover = object.handover_spec().clone();
    if handover.strategy.r#type != HandoverStrategyType::Relabel {
        return Ok(());
    }
    let Some(spec) = handover.strategy.relabel.as_ref() else {
        return Ok(());
    };
    let relabel = Relabel {
        cache,
        targets,
        gvk,
        spec,
        prober,
        resource_type: K::KIND,
    };

    let in_flight = object
        .handover_status()
        .map(|s| s.processing.clone())
        .unwrap_or_default();
    let mut still_processing = Vec::with_capacity(in_flight.len());
    let mut entries = in_flight.into_iter();
    while let Some(entry) = entries.next() {
        match relabel.settle(&entry).await {
            Ok(true) => info!("{} {} finished handover", gvk.kind, entry.name),
            Ok(false) => still_processing.push(entry),
            Err(err) => {
                still_processing.push(entry);
                still_processing.extend(entries);
                object.handover_status_mut().processing = still_processing;
                return Err(err.context("handling processing set"));
            }
        }
    }

    let selector = Selector::from_requirements([Requirement::in_values(
        spec.label_key.clone(),
        [spec.to_value.clone(), spec.initial_value.clone()],
    )]);
    let namespace = object.namespace();
    let candidates: Vec<Candidate> = cache
        .list(gvk, &selector, namespace.as_deref())
        .await
        .with_context(|| format!("listing {}", describe_gvk(gvk)))?
        .into_iter()
        .map(|object| Candidate {
            available: relabel.is_available(&object),
            object,
        })
        .collect();

    let total = relabel.counts(&candidates);
    let unavailable = usize::try_from(total.found - total.available).unwrap_or_default();

    let mut queue = Queue {
        processing: still_processing,
        added: Vec::new(),
        max_unavailable: usize::try_from(spec.max_unavailable).unwrap_or_default(),
        unavailable,
    };

    let mut partitions = Vec::new();
    if let Some(partition) = &handover.partition {
        let order = order_partitions(
            candidates.iter().filter_map(|c| c.label(&partition.label_key)),
            &partition.order,
        );
        for name in order {
            let members: Vec<&Candidate> = candidates
                .iter()
                .filter(|c| c.label(&partition.label_key) == Some(name.as_str()))
                .collect();
            partitions.push(HandoverPartitionStatus {
                counts: relabel.counts(members.iter().copied()),
                name,
            });
            queue.fill(members.into_iter().filter(|c| relabel.is_old(c)));
        }
    }
    queue.fill(candidates.iter().filter(|c| relabel.is_old(c)));

    let Queue {
        processing, added, ..
    } = queue;
    let processing_len = processing.len();
    {
        let status = object.handover_status_mut();
        status.processing = processing;
        status.total = total;
        status.partitions = partitions;
    }

    for mut target in added {
        info!("{} {} entered the processing set", gvk.kind, target.name_any());
        relabel.relabel(&mut target).await?;
    }

    let generation = object.meta().generation;
    let (status, reason, message) = if total.found == total.updated {
        (CONDITION_STATUS_TRUE, REASON_COMPLETE, MESSAGE_COMPLETE)
    } else {
        (CONDITION_STATUS_FALSE, REASON_INCOMPLETE, MESSAGE_INCOMPLETE)
    };
    set_condition(
        object.conditions_mut(),
        CONDITION_TYPE_COMPLETED,
        status,
        reason,
        message,
        generation,
    );

    metrics::set_handover_objects(
        &object.name_any(),
        total.found,
        total.available,
        total.updated,
        processing_len,
    );
    Ok(())
}
