// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common view over the coordination resources.
//!
//! [`Adoption`], [`ClusterAdoption`] and [`ClusterHandover`] share one
//! reconcile pipeline (finalizer, dynamic watch, strategy, status). The
//! pipeline is written against [`CoordinationObject`]; the engines narrow it
//! further with [`AdoptionObject`] and [`HandoverObject`].

use crate::crd::{
    Adoption, AdoptionCommonSpec, AdoptionStatus, AdoptionStrategyType, ClusterAdoption,
    ClusterHandover, ClusterHandoverSpec, ClusterHandoverStatus, Condition, HandoverStrategyType,
    TargetApi,
};
use crate::dynamic_cache::OwnerReference;
use crate::errors::SpecError;
use crate::reconcilers::status::is_condition_true;
use crate::status_reasons::{
    CONDITION_TYPE_ACTIVE, CONDITION_TYPE_COMPLETED, PHASE_ACTIVE, PHASE_COMPLETED, PHASE_PENDING,
    PHASE_PROGRESSING,
};
use kube::core::{ClusterResourceScope, NamespaceResourceScope};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Behavior shared by every coordination resource.
pub trait CoordinationObject:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Resource kind, used for logs and metrics.
    const KIND: &'static str;

    /// Condition type whose `True` status means the object reached its goal.
    const TERMINAL_CONDITION: &'static str;

    /// API handle for objects of this kind, scoped to `namespace` where the kind is namespaced.
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;

    fn target_api(&self) -> &TargetApi;

    fn conditions(&self) -> &[Condition];

    fn conditions_mut(&mut self) -> &mut Vec<Condition>;

    fn phase(&self) -> Option<&str>;

    fn set_phase(&mut self, phase: &str);

    fn set_observed_generation(&mut self, generation: Option<i64>);

    /// Body of a merge patch against the status subresource.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be serialized.
    fn status_patch(&self) -> serde_json::Result<Value>;

    /// Checks the spec for mistakes no retry can fix.
    ///
    /// # Errors
    ///
    /// Returns the first [`SpecError`] found.
    fn validate(&self) -> Result<(), SpecError>;

    /// Mirrors the terminal condition into the cosmetic `phase` field.
    fn update_phase(&mut self);

    fn is_terminal(&self) -> bool {
        is_condition_true(self.conditions(), Self::TERMINAL_CONDITION)
    }

    fn owner_reference(&self) -> OwnerReference {
        OwnerReference::from_resource(self)
    }
}

/// Adoption resources, namespaced or cluster-scoped.
pub trait AdoptionObject: CoordinationObject {
    fn common_spec(&self) -> &AdoptionCommonSpec;

    fn adoption_status(&self) -> Option<&AdoptionStatus>;

    fn adoption_status_mut(&mut self) -> &mut AdoptionStatus;

    /// Namespace target objects are listed in; `None` lists cluster-wide.
    fn target_namespace(&self) -> Option<String>;
}

/// Handover resources.
pub trait HandoverObject: CoordinationObject {
    fn handover_spec(&self) -> &ClusterHandoverSpec;

    fn handover_status(&self) -> Option<&ClusterHandoverStatus>;

    fn handover_status_mut(&mut self) -> &mut ClusterHandoverStatus;
}

fn namespaced_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

fn cluster_api<K>(client: Client, _namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = ClusterResourceScope>,
{
    Api::all(client)
}

/// Checks that the target API names a version and a kind.
///
/// # Errors
///
/// Returns [`SpecError::EmptyTargetApiField`] naming the empty field.
pub fn validate_target_api(target: &TargetApi) -> Result<(), SpecError> {
    if target.version.is_empty() {
        return Err(SpecError::EmptyTargetApiField { field: "version" });
    }
    if target.kind.is_empty() {
        return Err(SpecError::EmptyTargetApiField { field: "kind" });
    }
    Ok(())
}

/// Validation shared by both adoption kinds.
///
/// # Errors
///
/// Returns a [`SpecError`] for an empty target API, a strategy type without
/// its parameters, or round-robin options that are missing or empty.
pub fn validate_adoption_spec(spec: &AdoptionCommonSpec) -> Result<(), SpecError> {
    validate_target_api(&spec.target_api)?;

    match spec.strategy.r#type {
        AdoptionStrategyType::Static => {
            if spec.strategy.static_.is_none() {
                return Err(SpecError::MissingStrategy {
                    strategy: "Static".to_string(),
                    field: "static",
                });
            }
        }
        AdoptionStrategyType::RoundRobin => {
            let Some(round_robin) = &spec.strategy.round_robin else {
                return Err(SpecError::MissingStrategy {
                    strategy: "RoundRobin".to_string(),
                    field: "roundRobin",
                });
            };
            if round_robin.options.is_empty() {
                return Err(SpecError::EmptyRoundRobinOptions);
            }
            if let Some(index) = round_robin.options.iter().position(BTreeMap::is_empty) {
                return Err(SpecError::EmptyRoundRobinOption(index));
            }
        }
    }
    Ok(())
}

/// Validation of a handover spec.
///
/// # Errors
///
/// Returns a [`SpecError`] for an empty target API, missing relabel
/// parameters, empty relabel fields, identical values or a
/// `maxUnavailable` below one.
pub fn validate_handover_spec(spec: &ClusterHandoverSpec) -> Result<(), SpecError> {
    validate_target_api(&spec.target_api)?;

    match spec.strategy.r#type {
        HandoverStrategyType::Relabel => {
            let Some(relabel) = &spec.strategy.relabel else {
                return Err(SpecError::MissingStrategy {
                    strategy: "Relabel".to_string(),
                    field: "relabel",
                });
            };
            for (field, value) in [
                ("labelKey", &relabel.label_key),
                ("initialValue", &relabel.initial_value),
                ("toValue", &relabel.to_value),
                ("observedLabelValuePath", &relabel.observed_label_value_path),
            ] {
                if value.is_empty() {
                    return Err(SpecError::EmptyRelabelField { field });
                }
            }
            if relabel.initial_value == relabel.to_value {
                return Err(SpecError::IdenticalRelabelValues(relabel.to_value.clone()));
            }
            if relabel.max_unavailable < 1 {
                return Err(SpecError::MaxUnavailableTooLow(relabel.max_unavailable));
            }
        }
    }
    Ok(())
}

macro_rules! impl_adoption_object {
    ($ty:ty, $kind:expr, $api:ident) => {
        impl CoordinationObject for $ty {
            const KIND: &'static str = $kind;
            const TERMINAL_CONDITION: &'static str = CONDITION_TYPE_ACTIVE;

            fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
                $api(client, namespace)
            }

            fn target_api(&self) -> &TargetApi {
                &self.spec.common.target_api
            }

            fn conditions(&self) -> &[Condition] {
                self.status
                    .as_ref()
                    .map(|s| s.conditions.as_slice())
                    .unwrap_or_default()
            }

            fn conditions_mut(&mut self) -> &mut Vec<Condition> {
                &mut self.adoption_status_mut().conditions
            }

            fn phase(&self) -> Option<&str> {
                self.status.as_ref().and_then(|s| s.phase.as_deref())
            }

            fn set_phase(&mut self, phase: &str) {
                self.adoption_status_mut().phase = Some(phase.to_string());
            }

            fn set_observed_generation(&mut self, generation: Option<i64>) {
                self.adoption_status_mut().observed_generation = generation;
            }

            fn status_patch(&self) -> serde_json::Result<Value> {
                let status = serde_json::to_value(self.status.clone().unwrap_or_default())?;
                Ok(json!({ "status": status }))
            }

            fn validate(&self) -> Result<(), SpecError> {
                validate_adoption_spec(&self.spec.common)
            }

            fn update_phase(&mut self) {
                let phase = if self.is_terminal() {
                    PHASE_ACTIVE
                } else {
                    PHASE_PENDING
                };
                self.set_phase(phase);
            }
        }

        impl AdoptionObject for $ty {
            fn common_spec(&self) -> &AdoptionCommonSpec {
                &self.spec.common
            }

            fn adoption_status(&self) -> Option<&AdoptionStatus> {
                self.status.as_ref()
            }

            fn adoption_status_mut(&mut self) -> &mut AdoptionStatus {
                self.status.get_or_insert_with(AdoptionStatus::default)
            }

            fn target_namespace(&self) -> Option<String> {
                self.metadata.namespace.clone()
            }
        }
    };
}

impl_adoption_object!(Adoption, "Adoption", namespaced_api);
impl_adoption_object!(ClusterAdoption, "ClusterAdoption", cluster_api);

impl CoordinationObject for ClusterHandover {
    const KIND: &'static str = "ClusterHandover";
    const TERMINAL_CONDITION: &'static str = CONDITION_TYPE_COMPLETED;

    fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
        cluster_api(client, namespace)
    }

    fn target_api(&self) -> &TargetApi {
        &self.spec.target_api
    }

    fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.handover_status_mut().conditions
    }

    fn phase(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.phase.as_deref())
    }

    fn set_phase(&mut self, phase: &str) {
        self.handover_status_mut().phase = Some(phase.to_string());
    }

    fn set_observed_generation(&mut self, generation: Option<i64>) {
        self.handover_status_mut().observed_generation = generation;
    }

    fn status_patch(&self) -> serde_json::Result<Value> {
        let status = serde_json::to_value(self.status.clone().unwrap_or_default())?;
        Ok(json!({ "status": status }))
    }

    fn validate(&self) -> Result<(), SpecError> {
        validate_handover_spec(&self.spec)
    }

    fn update_phase(&mut self) {
        let phase = if self.is_terminal() {
            PHASE_COMPLETED
        } else {
            PHASE_PROGRESSING
        };
        self.set_phase(phase);
    }
}

impl HandoverObject for ClusterHandover {
    fn handover_spec(&self) -> &ClusterHandoverSpec {
        &self.spec
    }

    fn handover_status(&self) -> Option<&ClusterHandoverStatus> {
        self.status.as_ref()
    }

    fn handover_status_mut(&mut self) -> &mut ClusterHandoverStatus {
        self.status.get_or_insert_with(ClusterHandoverStatus::default)
    }
}

#[cfg(test)]
#[path = "coordination_tests.rs"]
mod coordination_tests;
