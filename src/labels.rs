// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label constants and label-map helpers shared by the reconcilers.
//!
//! Target objects are shared with other controllers, so everything here
//! touches only the keys it is handed and leaves the rest of the label map
//! untouched.

use std::collections::BTreeMap;

// ============================================================================
// Dynamic Cache Labels
// ============================================================================

/// Label marking an object as a member of the dynamic cache
pub const CACHE_LABEL_KEY: &str = "package-operator.run/cache";

/// Value of [`CACHE_LABEL_KEY`] on cached objects
pub const CACHE_LABEL_VALUE: &str = "True";

// ============================================================================
// Helpers
// ============================================================================

/// Overlays `additions` on top of `existing`, returning whether anything changed.
///
/// Keys present in both maps take the value from `additions`.
pub fn merge_labels(existing: &mut BTreeMap<String, String>, additions: &BTreeMap<String, String>) -> bool {
    let mut changed = false;
    for (key, value) in additions {
        if existing.get(key) != Some(value) {
            existing.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Returns the value of `key` in an optional label map.
#[must_use]
pub fn label_value<'a>(labels: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    labels.get(key).map(String::as_str)
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod labels_tests;
