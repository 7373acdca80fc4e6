// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for adoption and handover coordination.
//!
//! # Resource Types
//!
//! - [`Adoption`] - namespaced; stamps an initial label set onto unlabeled target objects
//! - [`ClusterAdoption`] - cluster-scoped variant of [`Adoption`]
//! - [`ClusterHandover`] - migrates a label on target objects from one value to another
//!
//! Every coordination object names the kind it operates on through a
//! [`TargetApi`]. Target objects are never typed; they are read and written
//! as dynamic objects.
//!
//! # Example: Round-robin Adoption
//!
//! ```rust,no_run
//! use package_coordination::crd::{
//!     AdoptionCommonSpec, AdoptionSpec, AdoptionStrategy, AdoptionStrategyRoundRobinSpec,
//!     AdoptionStrategyType, TargetApi,
//! };
//! use std::collections::BTreeMap;
//!
//! let option = |v: &str| BTreeMap::from([("shard".to_string(), v.to_string())]);
//!
//! let spec = AdoptionSpec {
//!     common: AdoptionCommonSpec {
//!         target_api: TargetApi {
//!             group: "apps".to_string(),
//!             version: "v1".to_string(),
//!             kind: "Deployment".to_string(),
//!         },
//!         strategy: AdoptionStrategy {
//!             r#type: AdoptionStrategyType::RoundRobin,
//!             static_: None,
//!             round_robin: Some(AdoptionStrategyRoundRobinSpec {
//!                 always: BTreeMap::new(),
//!                 options: vec![option("a"), option("b")],
//!             }),
//!         },
//!     },
//! };
//! ```

use kube::core::GroupVersionKind;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Shared Types
// ============================================================================

/// Group, version and kind of the objects a coordination resource operates on.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct TargetApi {
    /// API group of the target kind. Empty for the core group.
    #[serde(default)]
    pub group: String,

    /// API version of the target kind (e.g., "v1").
    #[schemars(length(min = 1))]
    pub version: String,

    /// Kind of the target objects (e.g., "Deployment").
    #[schemars(length(min = 1))]
    pub kind: String,
}

impl TargetApi {
    /// Converts the target API into a `GroupVersionKind`.
    #[must_use]
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }
}

/// Condition represents an observation of a coordination object's state.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition: `Active` for adoptions, `Completed` for handovers.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// `.metadata.generation` the condition was set for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Label selector to match Kubernetes resources.
///
/// The result of matchLabels and matchExpressions are `ANDed`. An empty
/// label selector matches all objects.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Map of {key,value} pairs; each pair is equivalent to an `In` requirement with one value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,

    /// List of label selector requirements. All requirements must be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_expressions: Option<Vec<LabelSelectorRequirement>>,
}

/// A label selector requirement relating a key to a set of values.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct LabelSelectorRequirement {
    /// The label key that the selector applies to.
    pub key: String,

    /// One of `In`, `NotIn`, `Exists` and `DoesNotExist`.
    pub operator: String,

    /// Values for `In` and `NotIn`; must be empty for `Exists` and `DoesNotExist`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

// ============================================================================
// Probes
// ============================================================================

/// A single availability probe. Exactly one variant should be filled;
/// entries with no variant are ignored.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    /// Checks that the object reports a condition with the given type and status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ProbeConditionSpec>,

    /// Compares the values found under two JSON paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields_equal: Option<ProbeFieldsEqualSpec>,

    /// Evaluates a CEL rule against the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cel: Option<ProbeCelSpec>,
}

/// Condition probe parameters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ProbeConditionSpec {
    /// Condition type to probe for (e.g., "Available").
    pub r#type: String,

    /// Condition status to probe for.
    #[serde(default = "default_condition_status")]
    pub status: String,
}

fn default_condition_status() -> String {
    "True".to_string()
}

/// Compares two fields specified by dotted JSON paths.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProbeFieldsEqualSpec {
    /// First field for comparison (e.g., ".spec.fieldA").
    pub field_a: String,

    /// Second field for comparison (e.g., ".status.fieldB").
    pub field_b: String,
}

/// Uses the Common Expression Language to probe an object.
///
/// The rule sees the object as `self` and must evaluate to a boolean.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ProbeCelSpec {
    /// CEL rule to evaluate (e.g., `self.metadata.name == "Hans"`).
    pub rule: String,

    /// Message reported when the rule evaluates to false.
    pub message: String,
}

/// A list of probes restricted to the objects matched by a selector.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct ObjectSetProbe {
    /// Probes applied to matching objects.
    pub probes: Vec<Probe>,

    /// Objects the probes apply to.
    #[serde(default)]
    pub selector: ProbeSelector,
}

/// Selects the subset of objects a probe applies to.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct ProbeSelector {
    /// API group and kind of the objects to probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ProbeKindSpec>,

    /// Further sub-selects objects based on their labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

/// API group and kind used by a [`ProbeSelector`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ProbeKindSpec {
    /// Object group (e.g., "apps"). Empty for the core group.
    #[serde(default)]
    pub group: String,

    /// Object kind (e.g., "Deployment").
    pub kind: String,
}

// ============================================================================
// Adoption
// ============================================================================

/// Adoption strategy selector.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub enum AdoptionStrategyType {
    /// Apply a fixed label set to every unlabeled object.
    #[default]
    Static,
    /// Distribute label sets from a list of options.
    RoundRobin,
}

/// Adoption strategy; the field matching `type` must be set.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdoptionStrategy {
    /// Which strategy variant is active.
    pub r#type: AdoptionStrategyType,

    /// Parameters of the `Static` strategy.
    #[serde(rename = "static", skip_serializing_if = "Option::is_none")]
    pub static_: Option<AdoptionStrategyStaticSpec>,

    /// Parameters of the `RoundRobin` strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_robin: Option<AdoptionStrategyRoundRobinSpec>,
}

/// Labels applied by the `Static` strategy.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct AdoptionStrategyStaticSpec {
    /// Labels merged into every unlabeled target object.
    pub labels: BTreeMap<String, String>,
}

/// Label options distributed by the `RoundRobin` strategy.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct AdoptionStrategyRoundRobinSpec {
    /// Labels applied to every object regardless of the chosen option.
    #[serde(default)]
    pub always: BTreeMap<String, String>,

    /// Label sets handed out in order, one per object.
    #[schemars(length(min = 1))]
    pub options: Vec<BTreeMap<String, String>>,
}

/// Spec fields shared by [`Adoption`] and [`ClusterAdoption`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdoptionCommonSpec {
    /// Strategy used to label new objects.
    pub strategy: AdoptionStrategy,

    /// Kind of objects to adopt.
    #[serde(rename = "targetAPI")]
    pub target_api: TargetApi,
}

/// Adoption stamps an initial label set onto target objects in its own namespace.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "coordination.package-operator.run",
    version = "v1alpha1",
    kind = "Adoption",
    namespaced,
    doc = "Adoption stamps an initial label set onto unlabeled target objects within its namespace, either statically or round-robin across label options."
)]
#[kube(status = "AdoptionStatus")]
#[kube(printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
#[serde(rename_all = "camelCase")]
pub struct AdoptionSpec {
    #[serde(flatten)]
    pub common: AdoptionCommonSpec,
}

/// `ClusterAdoption` stamps an initial label set onto target objects in all namespaces.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "coordination.package-operator.run",
    version = "v1alpha1",
    kind = "ClusterAdoption",
    doc = "ClusterAdoption stamps an initial label set onto unlabeled target objects across the whole cluster, either statically or round-robin across label options."
)]
#[kube(status = "AdoptionStatus")]
#[kube(printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAdoptionSpec {
    #[serde(flatten)]
    pub common: AdoptionCommonSpec,
}

/// Status shared by [`Adoption`] and [`ClusterAdoption`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdoptionStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Round-robin checkpoint. Serialized as `null` when cleared so that a
    /// merge patch removes it.
    #[serde(default)]
    pub round_robin: Option<AdoptionRoundRobinStatus>,
}

/// Round-robin continuation state.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdoptionRoundRobinStatus {
    /// Index into `options` that was last committed; `-1` before the first commit.
    pub last_index: i64,
}

// ============================================================================
// Handover
// ============================================================================

/// Handover strategy selector.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub enum HandoverStrategyType {
    /// Change the value of a single label key.
    #[default]
    Relabel,
}

/// Handover strategy; the field matching `type` must be set.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct HandoverStrategy {
    /// Which strategy variant is active.
    pub r#type: HandoverStrategyType,

    /// Parameters of the `Relabel` strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relabel: Option<HandoverStrategyRelabelSpec>,
}

/// Relabel strategy parameters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HandoverStrategyRelabelSpec {
    /// Label key to migrate.
    #[schemars(length(min = 1))]
    pub label_key: String,

    /// Value objects carry before the handover.
    #[schemars(length(min = 1))]
    pub initial_value: String,

    /// Value objects carry after the handover.
    #[schemars(length(min = 1))]
    pub to_value: String,

    /// Path in the target object reporting the label value its controller observed
    /// (e.g., ".status.controller").
    #[schemars(length(min = 1))]
    pub observed_label_value_path: String,

    /// Maximum number of objects that may be unavailable during the handover.
    #[serde(default = "default_max_unavailable")]
    #[schemars(range(min = 1, max = 2_147_483_647))]
    pub max_unavailable: i32,
}

fn default_max_unavailable() -> i32 {
    1
}

/// Ordering of handover partitions.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub enum PartitionOrderType {
    /// Explicit list first, remaining values alphanumerically.
    #[default]
    Static,
    /// Lexical order of label values.
    AlphaNumeric,
    /// Numeric order of label values.
    Numeric,
}

/// Groups target objects by a label value and processes the groups in order.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSpec {
    /// Label key whose values define the partitions.
    pub label_key: String,

    /// Order in which partitions are processed.
    #[serde(default)]
    pub order: PartitionOrderingSpec,
}

/// Partition ordering parameters.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct PartitionOrderingSpec {
    /// Ordering kind.
    #[serde(default)]
    pub r#type: PartitionOrderType,

    /// Values processed first, in this order, when `type` is `Static`.
    #[serde(rename = "static", default, skip_serializing_if = "Vec::is_empty")]
    pub static_: Vec<String>,
}

/// `ClusterHandover` migrates a label on target objects cluster-wide.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "coordination.package-operator.run",
    version = "v1alpha1",
    kind = "ClusterHandover",
    doc = "ClusterHandover migrates target objects from one value of a label to another, bounded by maxUnavailable and gated by availability probes."
)]
#[kube(status = "ClusterHandoverStatus")]
#[kube(printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
#[serde(rename_all = "camelCase")]
pub struct ClusterHandoverSpec {
    /// Strategy used to hand objects over.
    pub strategy: HandoverStrategy,

    /// Kind of objects to hand over.
    #[serde(rename = "targetAPI")]
    pub target_api: TargetApi,

    /// Optional partitioning of target objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<PartitionSpec>,

    /// Probes deciding whether a target object is available.
    #[serde(default)]
    pub availability_probes: Vec<Probe>,
}

/// `ClusterHandover` status.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterHandoverStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Counts across all found objects.
    #[serde(default)]
    pub total: HandoverCountsStatus,

    /// Counts per partition, in processing order.
    #[serde(default)]
    pub partitions: Vec<HandoverPartitionStatus>,

    /// Objects currently being handed over.
    #[serde(default)]
    pub processing: Vec<HandoverRefStatus>,
}

/// Object counts of a handover or one of its partitions.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct HandoverCountsStatus {
    /// Objects carrying either the initial or the new label value.
    pub found: i32,
    /// Found objects passing the availability probes.
    pub available: i32,
    /// Found objects carrying the new label value.
    pub updated: i32,
}

/// Counts of a single partition.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct HandoverPartitionStatus {
    /// Partition label value.
    pub name: String,

    #[serde(flatten)]
    pub counts: HandoverCountsStatus,
}

/// Reference to an object in the processing set.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, Hash, JsonSchema)]
pub struct HandoverRefStatus {
    pub uid: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}
