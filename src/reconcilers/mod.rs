// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for the coordination resources.
//!
//! # Reconciliation Architecture
//!
//! Every coordination object goes through the same steps:
//!
//! 1. **Prepare** - handle deletion, ensure the cache finalizer, validate the
//!    spec and start watching the target kind
//! 2. **Strategies** - read target objects from the dynamic cache and write
//!    label changes through a [`writer::TargetWriter`]
//! 3. **Status** - mirror conditions into the phase and persist the status,
//!    also when a strategy failed part way
//!
//! # Available Engines
//!
//! - [`AdoptionEngine`] - `Static` and `RoundRobin` adoption for
//!   [`crate::crd::Adoption`] and [`crate::crd::ClusterAdoption`]
//! - [`HandoverEngine`] - `Relabel` handover for [`crate::crd::ClusterHandover`]
//!
//! # Example: Driving an Engine
//!
//! ```rust,no_run
//! use package_coordination::config::OperatorConfig;
//! use package_coordination::crd::Adoption;
//! use package_coordination::dynamic_cache::{DynamicCache, KubeInformerFactory};
//! use package_coordination::reconcilers::{AdoptionEngine, KubeWriter};
//! use std::sync::Arc;
//!
//! async fn reconcile(client: kube::Client, adoption: Adoption) -> anyhow::Result<()> {
//!     let cache = Arc::new(DynamicCache::new(KubeInformerFactory::new(client.clone())));
//!     let writer = Arc::new(KubeWriter::new(client));
//!     let engine = AdoptionEngine::<Adoption>::new(
//!         cache,
//!         writer.clone(),
//!         writer,
//!         OperatorConfig::default(),
//!     );
//!     engine.reconcile(adoption).await?;
//!     Ok(())
//! }
//! ```

pub mod adoption;
pub mod finalizers;
pub mod handover;
pub mod pipeline;
pub mod status;
pub mod writer;

#[cfg(test)]
pub mod testing;

pub use adoption::AdoptionEngine;
pub use handover::HandoverEngine;
pub use writer::{CoordinationWriter, KubeWriter, TargetWriter};
