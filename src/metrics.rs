// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the coordination operator.
//!
//! All metrics carry the prefix `package_coordination_` and are exposed on the
//! `/metrics` endpoint served by the operator binary.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Outcomes and duration per coordination kind
//! - **Dynamic Cache Metrics** - Running informers and cached objects per kind
//! - **Target Metrics** - Label writes to target objects
//! - **Handover Metrics** - Progress of running handovers
//!
//! # Example
//!
//! ```rust,no_run
//! use package_coordination::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("Adoption", std::time::Duration::from_millis(20));
//! ```

use kube::core::GroupVersionKind;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all operator metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "package_coordination";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Coordination kind (`Adoption`, `ClusterAdoption`, `ClusterHandover`)
/// - `status`: Outcome (`success`, `error`, `requeue`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of requeue operations
///
/// Labels:
/// - `resource_type`: Coordination kind
/// - `reason`: `error`, `ready` or `not_ready`
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of requeue operations by resource type and reason",
    );
    let counter = CounterVec::new(opts, &["resource_type", "reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of errors by resource type and error category
///
/// Labels:
/// - `resource_type`: Coordination kind
/// - `error_type`: `reconcile_error`, `invalid_spec`, `probe_parse_error`
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of errors by resource type and error category",
    );
    let counter = CounterVec::new(opts, &["resource_type", "error_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Dynamic Cache Metrics
// ============================================================================

/// Number of informers the dynamic cache is running
pub static DYNAMIC_CACHE_INFORMERS: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_dynamic_cache_informers"),
        "Number of informers started by the dynamic cache",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Objects held per watched kind
///
/// Labels:
/// - `gvk`: `group/version, Kind=kind`
pub static DYNAMIC_CACHE_OBJECTS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_dynamic_cache_objects"),
        "Number of objects held in the dynamic cache by kind",
    );
    let gauge = GaugeVec::new(opts, &["gvk"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Target Metrics
// ============================================================================

/// Label writes issued against target objects
///
/// Labels:
/// - `resource_type`: Coordination kind issuing the write
/// - `status`: `success` or `error`
pub static TARGET_LABEL_UPDATES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_target_label_updates_total"),
        "Total number of label updates written to target objects",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Handover Metrics
// ============================================================================

/// Object counts of a handover
///
/// Labels:
/// - `handover`: Name of the `ClusterHandover`
/// - `state`: `found`, `available`, `updated` or `processing`
pub static HANDOVER_OBJECTS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_handover_objects"),
        "Object counts of a handover by state",
    );
    let gauge = GaugeVec::new(opts, &["handover", "state"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a reconciliation requeue
///
/// # Arguments
/// * `resource_type` - The coordination kind reconciled
/// * `reason` - Reason for requeue (e.g., `error`, `not_ready`)
pub fn record_reconciliation_requeue(resource_type: &str, reason: &str) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "requeue"])
        .inc();
    REQUEUE_TOTAL
        .with_label_values(&[resource_type, reason])
        .inc();
}

/// Record an error
pub fn record_error(resource_type: &str, error_type: &str) {
    ERRORS_TOTAL
        .with_label_values(&[resource_type, error_type])
        .inc();
}

/// Set the number of running dynamic informers.
#[allow(clippy::cast_precision_loss)]
pub fn set_dynamic_cache_informers(count: usize) {
    DYNAMIC_CACHE_INFORMERS.set(count as f64);
}

/// Set the number of cached objects for a kind.
#[allow(clippy::cast_precision_loss)]
pub fn set_dynamic_cache_objects(gvk: &GroupVersionKind, count: usize) {
    let gvk = format!("{}/{}, Kind={}", gvk.group, gvk.version, gvk.kind);
    DYNAMIC_CACHE_OBJECTS
        .with_label_values(&[gvk.as_str()])
        .set(count as f64);
}

/// Drop the object count of a kind that is no longer watched.
pub fn remove_dynamic_cache_objects(gvk: &GroupVersionKind) {
    let gvk = format!("{}/{}, Kind={}", gvk.group, gvk.version, gvk.kind);
    // Absent label values are fine: the informer may never have reported.
    let _ = DYNAMIC_CACHE_OBJECTS.remove_label_values(&[gvk.as_str()]);
}

/// Record a label write against a target object
pub fn record_target_label_update(resource_type: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    TARGET_LABEL_UPDATES_TOTAL
        .with_label_values(&[resource_type, status])
        .inc();
}

/// Publish the counters of a handover after a reconcile.
pub fn set_handover_objects(
    handover: &str,
    found: i32,
    available: i32,
    updated: i32,
    processing: usize,
) {
    #[allow(clippy::cast_precision_loss)]
    let processing = processing as f64;
    for (state, value) in [
        ("found", f64::from(found)),
        ("available", f64::from(available)),
        ("updated", f64::from(updated)),
        ("processing", processing),
    ] {
        HANDOVER_OBJECTS
            .with_label_values(&[handover, state])
            .set(value);
    }
}

/// Drop the counters of a deleted handover.
pub fn remove_handover_objects(handover: &str) {
    for state in ["found", "available", "updated", "processing"] {
        let _ = HANDOVER_OBJECTS.remove_label_values(&[handover, state]);
    }
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
