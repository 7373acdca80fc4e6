// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Package Coordination - Adoption and Handover Operator for Kubernetes
//!
//! This crate coordinates which operator instance controls a set of objects
//! by managing a single designated label on them. The objects may be of any
//! kind; the kind is chosen at runtime through a `targetAPI` reference.
//!
//! ## Overview
//!
//! - **Adoption** stamps new, unlabeled objects with an initial label set,
//!   either statically or by round-robin across several label alternatives.
//! - **Handover** migrates labeled objects from an initial label value to a
//!   target value, one bounded batch at a time, gated by availability probes
//!   and ordered by partition.
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types (`Adoption`, `ClusterAdoption`, `ClusterHandover`)
//! - [`dynamic_cache`] - on-demand informers keyed by Group/Version/Kind
//! - [`probing`] - availability probe DSL
//! - [`reconcilers`] - the adoption and handover engines
//! - [`context`] - shared context handed to every controller
//! - [`selector`] - label selector evaluation
//!
//! ## Example
//!
//! ```rust,no_run
//! use package_coordination::crd::{
//!     AdoptionCommonSpec, AdoptionStrategy, AdoptionStrategyStaticSpec, AdoptionStrategyType,
//!     ClusterAdoption, ClusterAdoptionSpec, TargetApi,
//! };
//! use std::collections::BTreeMap;
//!
//! let adoption = ClusterAdoption::new(
//!     "adopt-workloads",
//!     ClusterAdoptionSpec {
//!         common: AdoptionCommonSpec {
//!             target_api: TargetApi {
//!                 group: "apps".to_string(),
//!                 version: "v1".to_string(),
//!                 kind: "Deployment".to_string(),
//!             },
//!             strategy: AdoptionStrategy {
//!                 r#type: AdoptionStrategyType::Static,
//!                 static_: Some(AdoptionStrategyStaticSpec {
//!                     labels: BTreeMap::from([("operator".to_string(), "v1".to_string())]),
//!                 }),
//!                 round_robin: None,
//!             },
//!         },
//!     },
//! );
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod coordination;
pub mod crd;
pub mod dynamic_cache;
pub mod errors;
pub mod labels;
pub mod metrics;
pub mod probing;
pub mod reconcilers;
pub mod selector;
pub mod status_reasons;
pub mod unstructured;
