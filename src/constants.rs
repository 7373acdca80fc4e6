// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the coordination operator.
//!
//! Constants are grouped by concern. Values that tests may want to vary
//! (field manager, finalizer, cache label) are only defaults here; engines
//! read them from [`crate::config::OperatorConfig`].

// ============================================================================
// API Constants
// ============================================================================

/// API group for all coordination CRDs
pub const API_GROUP: &str = "coordination.package-operator.run";

/// API version for all coordination CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "coordination.package-operator.run/v1alpha1";

/// Kind name for the namespaced `Adoption` resource
pub const KIND_ADOPTION: &str = "Adoption";

/// Kind name for the cluster-scoped `ClusterAdoption` resource
pub const KIND_CLUSTER_ADOPTION: &str = "ClusterAdoption";

/// Kind name for the cluster-scoped `ClusterHandover` resource
pub const KIND_CLUSTER_HANDOVER: &str = "ClusterHandover";

// ============================================================================
// Ownership Constants
// ============================================================================

/// Field manager used for server-side apply requests.
pub const FIELD_MANAGER: &str = "package-operator";

/// Finalizer that blocks deletion of a coordination object until its
/// dynamic cache references have been released.
pub const CACHED_FINALIZER: &str = "package-operator.run/cached";

// ============================================================================
// Controller Timing Constants
// ============================================================================

/// Requeue interval once a coordination object reached its terminal condition (5 minutes)
pub const REQUEUE_WHEN_READY_SECS: u64 = 300;

/// Requeue interval while a coordination object is still progressing (30 seconds)
pub const REQUEUE_WHEN_NOT_READY_SECS: u64 = 30;

/// Requeue interval applied by the error policy (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Longest a cache read waits for a freshly started informer to finish its
/// initial list (10 seconds)
pub const CACHE_SYNC_TIMEOUT_SECS: u64 = 10;

/// Number of tokio worker threads for the controller runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Server Constants
// ============================================================================

/// Default bind address of the metrics and health HTTP server
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Path serving Prometheus metrics
pub const METRICS_PATH: &str = "/metrics";

/// Path serving the liveness probe
pub const HEALTHZ_PATH: &str = "/healthz";

/// Path serving the readiness probe
pub const READYZ_PATH: &str = "/readyz";
