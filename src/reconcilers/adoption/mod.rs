// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Adoption engine.
//!
//! Stamps an initial label set onto target objects that do not carry the
//! strategy's label keys yet. Works for both [`crate::crd::Adoption`] and
//! [`crate::crd::ClusterAdoption`]; the namespaced kind only adopts objects
//! in its own namespace.
//!
//! Strategies run in order. Each one does nothing unless it matches the
//! configured strategy type, except that the round-robin strategy clears its
//! status block when another strategy is selected.

pub mod round_robin;
pub mod static_strategy;

use crate::config::OperatorConfig;
use crate::coordination::AdoptionObject;
use crate::dynamic_cache::DynamicCache;
use crate::reconcilers::pipeline::{finish, prepare, Prepared};
use crate::reconcilers::writer::{CoordinationWriter, TargetWriter};
use anyhow::Result;
use kube::core::GroupVersionKind;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::debug;

/// Reconciles adoption objects of kind `K`.
pub struct AdoptionEngine<K: AdoptionObject> {
    cache: Arc<DynamicCache>,
    targets: Arc<dyn TargetWriter>,
    writer: Arc<dyn CoordinationWriter<K>>,
    config: OperatorConfig,
}

impl<K: AdoptionObject> AdoptionEngine<K> {
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
    /// adoption object fails. The status is still written when a strategy
    /// fails part way.
    pub async fn reconcile(&self, mut object: K) -> Result<K> {
        let gvk = match prepare(&self.cache, self.writer.as_ref(), &self.config, &mut object).await? {
            Prepared::Ready(gvk) => gvk,
            Prepared::Deleted | Prepared::Invalid => return Ok(object),
        };

        let outcome = self.run_strategies(&mut object, &gvk).await;
        finish(self.writer.as_ref(), &mut object, outcome).await?;

        debug!("Reconciled {} {}", K::KIND, object.name_any());
        Ok(object)
    }

    async fn run_strategies(&self, object: &mut K, gvk: &GroupVersionKind) -> Result<()> {
        static_strategy::reconcile(&self.cache, self.targets.as_ref(), object, gvk).await?;
        round_robin::reconcile(&self.cache, self.targets.as_ref(), object, gvk).await?;
        Ok(())
    }
}
