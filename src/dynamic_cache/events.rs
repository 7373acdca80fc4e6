// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Fan-out of target object events to subscribed controllers.

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// A change to a watched target object.
#[derive(Clone, Debug)]
pub struct CacheEvent {
    pub gvk: GroupVersionKind,
    pub object: Arc<DynamicObject>,
}

/// Delivers every event to every live subscriber.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    subscribers: Arc<Mutex<Vec<UnboundedSender<CacheEvent>>>>,
}

impl EventDispatcher {
    /// Registers a new subscriber.
    #[must_use]
    pub fn subscribe(&self) -> UnboundedReceiver<CacheEvent> {
        let (tx, rx) = unbounded();
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(tx),
            Err(poisoned) => poisoned.into_inner().push(tx),
        }
        rx
    }

    /// Sends `event` to all subscribers, dropping those whose receiver is gone.
    pub fn dispatch(&self, event: &CacheEvent) {
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Event subscriber list lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        subscribers.retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.lock() {
            Ok(subscribers) => subscribers.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
