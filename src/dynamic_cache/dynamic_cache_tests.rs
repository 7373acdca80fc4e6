// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `dynamic_cache/mod.rs`

use super::testing::{target_object, FakeInformerFactory};
use super::*;
use crate::crd::{Adoption, ClusterHandover};
use crate::selector::Requirement;
use futures::StreamExt;
use kube::runtime::reflector::ObjectRef;
use serde_json::json;
use std::sync::Arc;

fn deployments() -> GroupVersionKind {
    GroupVersionKind::gvk("apps", "v1", "Deployment")
}

fn config_maps() -> GroupVersionKind {
    GroupVersionKind::gvk("", "v1", "ConfigMap")
}

fn owner(kind: &str, name: &str, namespace: Option<&str>) -> OwnerReference {
    OwnerReference {
        group: "coordination.package-operator.run".to_string(),
        kind: kind.to_string(),
        uid: format!("uid-{name}"),
        name: name.to_string(),
        namespace: namespace.map(str::to_string),
    }
}

#[tokio::test]
async fn test_watch_starts_one_informer_per_kind() {
    let factory = FakeInformerFactory::new();
    let cache = DynamicCache::new(factory.clone());
    let a = owner("Adoption", "a", Some("ns"));
    let b = owner("Adoption", "b", Some("ns"));

    cache.watch(&a, &deployments()).await.unwrap();
    cache.watch(&a, &deployments()).await.unwrap();
    cache.watch(&b, &deployments()).await.unwrap();

    assert_eq!(factory.starts(), vec![deployments()]);
    assert_eq!(cache.informer_count(), 1);
    assert_eq!(cache.owners_for_gvk(&deployments()), vec![a, b]);
}

#[tokio::test]
async fn test_free_keeps_informer_while_other_owners_remain() {
    let cache = DynamicCache::new(FakeInformerFactory::new());
    let a = owner("Adoption", "a", Some("ns"));
    let b = owner("ClusterHandover", "b", None);

    cache.watch(&a, &deployments()).await.unwrap();
    cache.watch(&b, &deployments()).await.unwrap();
    cache.watch(&a, &config_maps()).await.unwrap();

    cache.free(&a).await.unwrap();

    assert!(cache.is_watching(&deployments()));
    assert!(!cache.is_watching(&config_maps()));
    assert_eq!(cache.owners_for_gvk(&deployments()), vec![b.clone()]);

    cache.free(&b).await.unwrap();
    assert_eq!(cache.informer_count(), 0);
    assert!(cache.owners_for_gvk(&deployments()).is_empty());
}

#[tokio::test]
async fn test_free_unknown_owner_is_noop() {
    let cache = DynamicCache::new(FakeInformerFactory::new());
    cache.free(&owner("Adoption", "ghost", Some("ns"))).await.unwrap();
    assert_eq!(cache.informer_count(), 0);
}

#[tokio::test]
async fn test_watch_again_after_free_restarts_informer() {
    let factory = FakeInformerFactory::new();
    let cache = DynamicCache::new(factory.clone());
    let a = owner("Adoption", "a", Some("ns"));

    cache.watch(&a, &deployments()).await.unwrap();
    cache.free(&a).await.unwrap();
    cache.watch(&a, &deployments()).await.unwrap();

    assert_eq!(factory.starts().len(), 2);
}

#[tokio::test]
async fn test_watch_surfaces_start_failure() {
    let factory = FakeInformerFactory::new();
    factory.fail_starts();
    let cache = DynamicCache::new(factory);
    let a = owner("Adoption", "a", Some("ns"));

    let err = cache.watch(&a, &deployments()).await.unwrap_err();
    assert!(matches!(err, CacheError::WatchStart { .. }));
    assert!(cache.owners_for_gvk(&deployments()).is_empty());
}

#[tokio::test]
async fn test_reads_before_watch_are_not_cached() {
    let cache = DynamicCache::new(FakeInformerFactory::new());

    let err = cache
        .list(&deployments(), &Selector::everything(), None)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "cache access for apps/v1, Kind=Deployment before calling watch, can not read objects"
    );

    let err = cache.get(&deployments(), "x", Some("ns")).await.unwrap_err();
    assert!(matches!(err, CacheError::NotCached { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_reads_give_up_on_unsynced_informer() {
    let factory = FakeInformerFactory::new();
    factory.hold_sync();
    let cache = DynamicCache::new(factory);
    cache
        .watch(&owner("Adoption", "a", Some("ns")), &deployments())
        .await
        .unwrap();

    let err = cache
        .list(&deployments(), &Selector::everything(), None)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CacheError::SyncTimeout {
            gvk: "apps/v1, Kind=Deployment".to_string(),
            seconds: crate::constants::CACHE_SYNC_TIMEOUT_SECS,
        }
    );

    let err = cache.get(&deployments(), "x", Some("ns")).await.unwrap_err();
    assert!(matches!(err, CacheError::SyncTimeout { .. }));
}

#[tokio::test]
async fn test_free_releases_object_count_metric() {
    let factory = FakeInformerFactory::new();
    let cache = DynamicCache::new(factory);
    let gvk = GroupVersionKind::gvk("free.test", "v1", "Counted");
    let a = owner("Adoption", "a", Some("ns"));
    cache.watch(&a, &gvk).await.unwrap();
    crate::metrics::set_dynamic_cache_objects(&gvk, 4);

    cache.free(&a).await.unwrap();

    let text = crate::metrics::gather_metrics().unwrap();
    assert!(!text.contains("free.test/v1, Kind=Counted"));
}

#[tokio::test]
async fn test_list_filters_by_selector_and_namespace() {
    let factory = FakeInformerFactory::new();
    let gvk = deployments();
    factory.apply(&gvk, target_object(&gvk, "b", Some("ns1"), &[], json!({})));
    factory.apply(&gvk, target_object(&gvk, "a", Some("ns1"), &[], json!({})));
    factory.apply(&gvk, target_object(&gvk, "c", Some("ns1"), &[("shard", "x")], json!({})));
    factory.apply(&gvk, target_object(&gvk, "d", Some("ns2"), &[], json!({})));
    let cache = DynamicCache::new(factory);
    cache.watch(&owner("Adoption", "o", Some("ns1")), &gvk).await.unwrap();

    let unlabeled = Selector::from_requirements([Requirement::does_not_exist("shard")]);
    let names: Vec<String> = cache
        .list(&gvk, &unlabeled, Some("ns1"))
        .await
        .unwrap()
        .iter()
        .map(ResourceExt::name_any)
        .collect();
    assert_eq!(names, vec!["a", "b"]);

    let everywhere = cache.list(&gvk, &unlabeled, None).await.unwrap();
    assert_eq!(everywhere.len(), 3);
}

#[tokio::test]
async fn test_get_returns_object_with_type_meta() {
    let factory = FakeInformerFactory::new();
    let gvk = deployments();
    let mut object = target_object(&gvk, "web", Some("ns"), &[], json!({}));
    object.types = None;
    factory.apply(&gvk, object);
    let cache = DynamicCache::new(factory);
    cache.watch(&owner("Adoption", "o", Some("ns")), &gvk).await.unwrap();

    let found = cache.get(&gvk, "web", Some("ns")).await.unwrap().unwrap();
    let types = found.types.unwrap();
    assert_eq!(types.api_version, "apps/v1");
    assert_eq!(types.kind, "Deployment");

    assert!(cache.get(&gvk, "web", Some("other")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_live_changes_are_visible_and_dispatched() {
    let factory = FakeInformerFactory::new();
    let gvk = deployments();
    let cache = DynamicCache::new(factory.clone());
    let mut events = cache.source();
    cache.watch(&owner("Adoption", "o", Some("ns")), &gvk).await.unwrap();

    factory.apply(&gvk, target_object(&gvk, "late", Some("ns"), &[], json!({})));

    let event = events.next().await.unwrap();
    assert_eq!(event.gvk, gvk);
    assert_eq!(event.object.name_any(), "late");
    assert!(cache.get(&gvk, "late", Some("ns")).await.unwrap().is_some());
}

#[tokio::test]
async fn test_watching_objects_filters_by_owner_kind() {
    let cache = DynamicCache::new(FakeInformerFactory::new());
    let gvk = deployments();
    cache.watch(&owner("Adoption", "a", Some("ns")), &gvk).await.unwrap();
    cache.watch(&owner("ClusterHandover", "h", None), &gvk).await.unwrap();

    let adoptions = enqueue::watching_objects::<Adoption>(&cache, &gvk);
    assert_eq!(adoptions, vec![ObjectRef::<Adoption>::new("a").within("ns")]);

    let handovers = enqueue::watching_objects::<ClusterHandover>(&cache, &gvk);
    assert_eq!(handovers, vec![ObjectRef::<ClusterHandover>::new("h")]);

    assert!(enqueue::watching_objects::<Adoption>(&cache, &config_maps()).is_empty());
}

#[tokio::test]
async fn test_enqueue_stream_maps_events_to_owners() {
    let factory = FakeInformerFactory::new();
    let gvk = deployments();
    let cache = Arc::new(DynamicCache::new(factory.clone()));
    cache.watch(&owner("Adoption", "a", Some("ns")), &gvk).await.unwrap();

    let stream = enqueue_watching_objects::<Adoption, _>(cache.clone(), cache.source());
    futures::pin_mut!(stream);

    factory.apply(&gvk, target_object(&gvk, "web", Some("ns"), &[], json!({})));

    let reference = stream.next().await.unwrap();
    assert_eq!(reference, ObjectRef::<Adoption>::new("a").within("ns"));
}

#[test]
fn test_owner_reference_display() {
    assert_eq!(
        owner("Adoption", "a", Some("ns")).to_string(),
        "Adoption.coordination.package-operator.run ns/a"
    );
    assert_eq!(
        owner("ClusterHandover", "h", None).to_string(),
        "ClusterHandover.coordination.package-operator.run h"
    );
}
