// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Handover engine for [`crate::crd::ClusterHandover`].
//!
//! ```text
//! prepare ─▶ parse probes ──error──▶ Completed=False (ProbeParseError)
//!                │
//!                ▼
//!         seed unlabeled objects ──updated any──▶ status, next pass
//!                │
//!                ▼
//!         relabel pass ─▶ counts, processing, Completed
//! ```

pub mod partition;
pub mod relabel;
pub mod seed;

use crate::config::OperatorConfig;
use crate::coordination::HandoverObject;
use crate::dynamic_cache::DynamicCache;
use crate::metrics;
use crate::probing::parse_probes;
use crate::reconcilers::pipeline::{finish, prepare, Prepared};
use crate::reconcilers::status::set_condition;
use crate::reconcilers::writer::{CoordinationWriter, TargetWriter};
use crate::status_reasons::{
    CONDITION_STATUS_FALSE, CONDITION_TYPE_COMPLETED, REASON_PROBE_PARSE_ERROR,
};
use anyhow::Result;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reconciles handover objects of kind `K`.
pub struct HandoverEngine<K: HandoverObject> {
    cache: Arc<DynamicCache>,
    targets: Arc<dyn TargetWriter>,
    writer: Arc<dyn CoordinationWriter<K>>,
    config: OperatorConfig,
}

impl<K: HandoverObject> HandoverEngine<K> {
    pub fn new(
        cache: Arc<DynamicCache>,
        targets: Arc<dyn TargetWriter>,
        writer: Arc<dyn CoordinationWriter<K>>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            cache,
            targets,
            writer,
            config,
        }
    }

    /// Runs one reconcile pass and returns the object as last written.
    ///
    /// # Errors
    ///
    /// Returns an error if a cache read, a target update or a write to the
    /// handover object fails.
    pub async fn reconcile(&self, mut object: K) -> Result<K> {
        let gvk = match prepare(&self.cache, self.writer.as_ref(), &self.config, &mut object).await? {
            Prepared::Ready(gvk) => gvk,
            Prepared::Deleted => {
                metrics::remove_handover_objects(&object.name_any());
                return Ok(object);
            }
            Prepared::Invalid => return Ok(object),
        };

        let prober = match parse_probes(&object.handover_spec().availability_probes) {
            Ok(prober) => prober,
            Err(err) => {
                warn!("{} {} has invalid probes: {}", K::KIND, object.name_any(), err);
                metrics::record_error(K::KIND, "probe_parse_error");
                let generation = object.meta().generation;
                set_condition(
                    object.conditions_mut(),
                    CONDITION_TYPE_COMPLETED,
                    CONDITION_STATUS_FALSE,
                    REASON_PROBE_PARSE_ERROR,
                    &err.to_string(),
                    generation,
                );
                finish(self.writer.as_ref(), &mut object, Ok(())).await?;
                return Ok(object);
            }
        };

        let outcome =
            match seed::adopt_unlabeled(&self.cache, self.targets.as_ref(), &object, &gvk).await {
                Ok(true) => Ok(()),
                Ok(false) => {
                    relabel::reconcile(
                        &self.cache,
                        self.targets.as_ref(),
                        &mut object,
                        &gvk,
                        prober.as_ref(),
                    )
                    .await
                }
                Err(err) => Err(err),
            };
        finish(self.writer.as_ref(), &mut object, outcome).await?;

        debug!("Reconciled {} {}", K::KIND, object.name_any());
        Ok(object)
    }
}

#[cfg(test)]
#[path = "handover_tests.rs"]
mod handover_tests;
