// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Maps target object events back to the coordination objects watching them.

use super::{CacheEvent, DynamicCache};
use futures::Stream;
use futures::StreamExt;
use kube::core::GroupVersionKind;
use kube::runtime::reflector::ObjectRef;
use kube::Resource;
use std::sync::Arc;

/// Turns cache events into reconcile requests for owners of kind `K`.
///
/// Each event for a watched kind enqueues every owner of that kind currently
/// registered for it. Owners of other coordination kinds are skipped so each
/// controller only sees its own objects.
pub fn enqueue_watching_objects<K, S>(
    cache: Arc<DynamicCache>,
    events: S,
) -> impl Stream<Item = ObjectRef<K>> + Send + 'static
where
    K: Resource<DynamicType = ()> + 'static,
    S: Stream<Item = CacheEvent> + Send + 'static,
{
    events.flat_map(move |event| futures::stream::iter(watching_objects::<K>(&cache, &event.gvk)))
}

/// Owners of kind `K` registered for `gvk`.
#[must_use]
pub fn watching_objects<K>(cache: &DynamicCache, gvk: &GroupVersionKind) -> Vec<ObjectRef<K>>
where
    K: Resource<DynamicType = ()>,
{
    let group = K::group(&());
    let kind = K::kind(&());

    cache
        .owners_for_gvk(gvk)
        .into_iter()
        .filter(|owner| owner.group == group && owner.kind == kind)
        .map(|owner| {
            let reference = ObjectRef::<K>::new(&owner.name);
            match owner.namespace.as_deref() {
                Some(ns) => reference.within(ns),
                None => reference,
            }
        })
        .collect()
}
