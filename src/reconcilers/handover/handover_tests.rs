// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the handover engine

use super::*;
use crate::coordination::CoordinationObject;
use crate::crd::{
    ClusterHandover, ClusterHandoverSpec, ClusterHandoverStatus, HandoverCountsStatus,
    HandoverRefStatus, HandoverStrategy, HandoverStrategyRelabelSpec, HandoverStrategyType,
    PartitionOrderType, PartitionOrderingSpec, PartitionSpec, Probe, ProbeConditionSpec, TargetApi,
};
use crate::dynamic_cache::testing::target_object;
use crate::reconcilers::status::find_condition;
use crate::reconcilers::testing::Harness;
use crate::status_reasons::{
    CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, PHASE_COMPLETED, PHASE_PROGRESSING,
    REASON_COMPLETE, REASON_INCOMPLETE,
};
use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use serde_json::{json, Value};

fn workloads() -> GroupVersionKind {
    GroupVersionKind::gvk("x.test", "v1", "W")
}

fn relabel_spec(max_unavailable: i32) -> HandoverStrategyRelabelSpec {
    HandoverStrategyRelabelSpec {
        label_key: "ver".to_string(),
        initial_value: "v1".to_string(),
        to_value: "v2".to_string(),
        observed_label_value_path: ".status.ver".to_string(),
        max_unavailable,
    }
}

fn available_probe() -> Probe {
    Probe {
        condition: Some(ProbeConditionSpec {
            r#type: "Available".to_string(),
            status: "True".to_string(),
        }),
        ..Probe::default()
    }
}

fn handover(max_unavailable: i32) -> ClusterHandover {
    let mut handover = ClusterHandover::new(
        "handover",
        ClusterHandoverSpec {
            strategy: HandoverStrategy {
                r#type: HandoverStrategyType::Relabel,
                relabel: Some(relabel_spec(max_unavailable)),
            },
            target_api: TargetApi {
                group: "x.test".to_string(),
                version: "v1".to_string(),
                kind: "W".to_string(),
            },
            partition: None,
            availability_probes: vec![available_probe()],
        },
    );
    handover.metadata.uid = Some("handover-uid".to_string());
    handover.metadata.generation = Some(2);
    handover
}

/// Status of a target whose controller reports `observed` and availability.
fn target_status(observed: &str, available: bool) -> Value {
    json!({
        "status": {
            "ver": observed,
            "conditions": [{
                "type": "Available",
                "status": if available { "True" } else { "False" },
                "observedGeneration": 1,
            }],
        }
    })
}

fn workload(name: &str, labels: &[(&str, &str)], observed: &str, available: bool) -> DynamicObject {
    target_object(&workloads(), name, Some("ns"), labels, target_status(observed, available))
}

fn engine(harness: &Harness<ClusterHandover>) -> HandoverEngine<ClusterHandover> {
    HandoverEngine::new(
        harness.cache.clone(),
        harness.targets.clone(),
        harness.writer.clone(),
        harness.config.clone(),
    )
}

/// Simulates the target's controller reporting a new status.
fn report(harness: &Harness<ClusterHandover>, name: &str, observed: &str, available: bool) {
    let mut object = harness.factory.object(&workloads(), name, Some("ns")).unwrap();
    object.data = target_status(observed, available);
    harness.factory.apply(&workloads(), object);
}

fn processing_names(handover: &ClusterHandover) -> Vec<String> {
    handover
        .handover_status()
        .map(|s| s.processing.iter().map(|e| e.name.clone()).collect())
        .unwrap_or_default()
}

fn ver_of(harness: &Harness<ClusterHandover>, name: &str) -> Option<String> {
    harness
        .labels_of(&workloads(), name, Some("ns"))
        .get("ver")
        .cloned()
}

#[tokio::test]
async fn test_unlabeled_objects_are_seeded_with_initial_value() {
    let harness = Harness::<ClusterHandover>::new();
    harness.seed(&workloads(), [workload("w1", &[], "", true)]);

    let reconciled = engine(&harness).reconcile(handover(1)).await.unwrap();

    assert_eq!(harness.targets.updates().len(), 1);
    assert_eq!(ver_of(&harness, "w1").as_deref(), Some("v1"));
    assert!(processing_names(&reconciled).is_empty());
}

#[tokio::test]
async fn test_probe_gates_processing_set() {
    let harness = Harness::<ClusterHandover>::new();
    harness.seed(
        &workloads(),
        ["w1", "w2", "w3"].map(|n| workload(n, &[("ver", "v1")], "v1", true)),
    );
    let engine = engine(&harness);

    // Pass 1: one object enters processing and is relabeled.
    let object = engine.reconcile(handover(1)).await.unwrap();
    assert_eq!(processing_names(&object), vec!["w1"]);
    assert_eq!(ver_of(&harness, "w1").as_deref(), Some("v2"));
    assert_eq!(harness.targets.updates().len(), 1);

    // Pass 2: the target still reports the old value.
    let object = engine.reconcile(object).await.unwrap();
    assert_eq!(processing_names(&object), vec!["w1"]);
    assert_eq!(harness.targets.updates().len(), 1);

    // Pass 3: observed but not available yet.
    report(&harness, "w1", "v2", false);
    let object = engine.reconcile(object).await.unwrap();
    assert_eq!(processing_names(&object), vec!["w1"]);

    // Pass 4: observed and available, the next object is picked.
    report(&harness, "w1", "v2", true);
    let object = engine.reconcile(object).await.unwrap();
    assert_eq!(processing_names(&object), vec!["w2"]);
    assert_eq!(ver_of(&harness, "w2").as_deref(), Some("v2"));
    assert_eq!(ver_of(&harness, "w3").as_deref(), Some("v1"));
}

#[tokio::test]
async fn test_unavailable_objects_exhaust_budget() {
    let harness = Harness::<ClusterHandover>::new();
    harness.seed(
        &workloads(),
        [
            workload("w1", &[("ver", "v1")], "v1", true),
            workload("w2", &[("ver", "v1")], "v1", false),
        ],
    );

    let object = engine(&harness).reconcile(handover(1)).await.unwrap();

    assert!(processing_names(&object).is_empty());
    assert!(harness.targets.updates().is_empty());
    let total = object.handover_status().unwrap().total;
    assert_eq!(
        total,
        HandoverCountsStatus {
            found: 2,
            available: 1,
            updated: 0,
        }
    );
}

#[tokio::test]
async fn test_processing_and_unavailable_stay_within_budget() {
    let harness = Harness::<ClusterHandover>::new();
    harness.seed(
        &workloads(),
        [
            workload("w1", &[("ver", "v1")], "v1", true),
            workload("w2", &[("ver", "v1")], "v1", true),
            workload("w3", &[("ver", "v1")], "v1", false),
            workload("w4", &[("ver", "v1")], "v1", true),
            workload("w5", &[("ver", "v1")], "v1", true),
        ],
    );
    let engine = engine(&harness);

    let mut object = handover(3);
    for _ in 0..3 {
        object = engine.reconcile(object).await.unwrap();
        let status = object.handover_status().unwrap();
        let unavailable = usize::try_from(status.total.found - status.total.available).unwrap();
        assert!(status.processing.len() + unavailable <= 3);
    }
    assert_eq!(processing_names(&object), vec!["w1", "w2"]);
}

#[tokio::test]
async fn test_unavailable_in_flight_object_blocks_new_entries() {
    let harness = Harness::<ClusterHandover>::new();
    harness.seed(
        &workloads(),
        ["w1", "w2", "w3"].map(|n| workload(n, &[("ver", "v1")], "v1", true)),
    );
    let engine = engine(&harness);

    let object = engine.reconcile(handover(2)).await.unwrap();
    assert_eq!(processing_names(&object), vec!["w1", "w2"]);

    // w1 picked up the new value but went unavailable, w2 finished.
    report(&harness, "w1", "v2", false);
    report(&harness, "w2", "v2", true);
    let object = engine.reconcile(object).await.unwrap();

    assert_eq!(processing_names(&object), vec!["w1"]);
    assert_eq!(ver_of(&harness, "w3").as_deref(), Some("v1"));
    let status = object.handover_status().unwrap();
    let unavailable = usize::try_from(status.total.found - status.total.available).unwrap();
    assert_eq!(unavailable, 1);
    assert!(status.processing.len() + unavailable <= 2);
}

#[tokio::test]
async fn test_handover_progresses_to_completion() {
    let harness = Harness::<ClusterHandover>::new();
    let names = ["w1", "w2", "w3"];
    harness.seed(
        &workloads(),
        names.map(|n| workload(n, &[("ver", "v1")], "v1", true)),
    );
    let engine = engine(&harness);

    let mut object = handover(1);
    let mut remaining = names.len();
    for _ in 0..names.len() {
        object = engine.reconcile(object).await.unwrap();
        let old = names
            .iter()
            .filter(|n| ver_of(&harness, n).as_deref() == Some("v1"))
            .count();
        assert!(old < remaining);
        remaining = old;
        for name in names {
            if ver_of(&harness, name).as_deref() == Some("v2") {
                report(&harness, name, "v2", true);
            }
        }
    }
    assert_eq!(remaining, 0);

    let object = engine.reconcile(object).await.unwrap();
    let status = object.handover_status().unwrap();
    assert!(status.processing.is_empty());
    assert_eq!(status.total.found, 3);
    assert_eq!(status.total.updated, 3);
    let completed = find_condition(object.conditions(), CONDITION_TYPE_COMPLETED).unwrap();
    assert_eq!(completed.status, CONDITION_STATUS_TRUE);
    assert_eq!(completed.reason.as_deref(), Some(REASON_COMPLETE));
    assert_eq!(completed.observed_generation, Some(2));
    assert_eq!(object.phase(), Some(PHASE_COMPLETED));
}

#[tokio::test]
async fn test_incomplete_handover_is_progressing() {
    let harness = Harness::<ClusterHandover>::new();
    harness.seed(&workloads(), [workload("w1", &[("ver", "v1")], "v1", true)]);

    let object = engine(&harness).reconcile(handover(1)).await.unwrap();

    let completed = find_condition(object.conditions(), CONDITION_TYPE_COMPLETED).unwrap();
    assert_eq!(completed.status, CONDITION_STATUS_FALSE);
    assert_eq!(completed.reason.as_deref(), Some(REASON_INCOMPLETE));
    assert_eq!(object.phase(), Some(PHASE_PROGRESSING));
}

#[tokio::test]
async fn test_vanished_and_replaced_objects_leave_processing() {
    let harness = Harness::<ClusterHandover>::new();
    harness.seed(&workloads(), [workload("w1", &[("ver", "v2")], "v1", true)]);
    let mut object = handover(1);
    object.status = Some(ClusterHandoverStatus {
        processing: vec![
            HandoverRefStatus {
                uid: "gone".to_string(),
                name: "ghost".to_string(),
                namespace: Some("ns".to_string()),
            },
            HandoverRefStatus {
                uid: "previous-w1".to_string(),
                name: "w1".to_string(),
                namespace: Some("ns".to_string()),
            },
        ],
        ..ClusterHandoverStatus::default()
    });

    let object = engine(&harness).reconcile(object).await.unwrap();

    assert!(processing_names(&object).is_empty());
}

#[tokio::test]
async fn test_multiple_observed_values_keep_processing_entry() {
    let harness = Harness::<ClusterHandover>::new();
    let mut w1 = workload("w1", &[("ver", "v2")], "v2", true);
    w1.data["status"]["vers"] = json!(["v2", "v2"]);
    harness.seed(&workloads(), [w1]);

    let mut object = handover(1);
    if let Some(relabel) = object.spec.strategy.relabel.as_mut() {
        relabel.observed_label_value_path = "{.status.vers[*]}".to_string();
    }
    object.status = Some(ClusterHandoverStatus {
        processing: vec![HandoverRefStatus {
            uid: "uid-ns-w1".to_string(),
            name: "w1".to_string(),
            namespace: Some("ns".to_string()),
        }],
        ..ClusterHandoverStatus::default()
    });

    let err = engine(&harness).reconcile(object).await.unwrap_err();

    assert!(format!("{err:#}").contains("multiple status values returned"));
    let stored = harness.writer.stored().unwrap();
    assert_eq!(processing_names(&stored), vec!["w1"]);
}

#[tokio::test]
async fn test_invalid_probe_reports_parse_error() {
    let harness = Harness::<ClusterHandover>::new();
    harness.seed(&workloads(), [workload("w1", &[("ver", "v1")], "v1", true)]);
    let mut object = handover(1);
    object.spec.availability_probes = vec![Probe {
        condition: Some(ProbeConditionSpec {
            r#type: String::new(),
            status: "True".to_string(),
        }),
        ..Probe::default()
    }];

    let object = engine(&harness).reconcile(object).await.unwrap();

    assert!(harness.targets.updates().is_empty());
    let completed = find_condition(object.conditions(), CONDITION_TYPE_COMPLETED).unwrap();
    assert_eq!(completed.status, CONDITION_STATUS_FALSE);
    assert_eq!(completed.reason.as_deref(), Some(REASON_PROBE_PARSE_ERROR));
}

#[tokio::test]
async fn test_partitions_are_processed_in_order() {
    let harness = Harness::<ClusterHandover>::new();
    harness.seed(
        &workloads(),
        [
            workload("w1", &[("ver", "v1"), ("zone", "b")], "v1", true),
            workload("w2", &[("ver", "v1"), ("zone", "a")], "v1", true),
            workload("w3", &[("ver", "v1"), ("zone", "c")], "v1", true),
        ],
    );
    let mut object = handover(1);
    object.spec.partition = Some(PartitionSpec {
        label_key: "zone".to_string(),
        order: PartitionOrderingSpec {
            r#type: PartitionOrderType::Static,
            static_: vec!["c".to_string()],
        },
    });

    let object = engine(&harness).reconcile(object).await.unwrap();

    assert_eq!(processing_names(&object), vec!["w3"]);
    let status = object.handover_status().unwrap();
    let partitions: Vec<&str> = status.partitions.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(partitions, vec!["c", "a", "b"]);
    assert!(status.partitions.iter().all(|p| p.counts.found == 1));
}

#[tokio::test]
async fn test_processing_entries_record_target_namespace() {
    let harness = Harness::<ClusterHandover>::new();
    harness.seed(&workloads(), [workload("w1", &[("ver", "v1")], "v1", true)]);

    let object = engine(&harness).reconcile(handover(1)).await.unwrap();

    let entry = &object.handover_status().unwrap().processing[0];
    assert_eq!(entry.namespace.as_deref(), Some("ns"));
    assert_eq!(entry.uid, "uid-ns-w1");
}
