// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `labels.rs`

use super::*;

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[test]
fn test_merge_labels_adds_missing_keys() {
    let mut existing = labels(&[("app", "web")]);
    let changed = merge_labels(&mut existing, &labels(&[("team", "a")]));

    assert!(changed);
    assert_eq!(existing, labels(&[("app", "web"), ("team", "a")]));
}

#[test]
fn test_merge_labels_overwrites_conflicting_values() {
    let mut existing = labels(&[("ver", "v1"), ("app", "web")]);
    let changed = merge_labels(&mut existing, &labels(&[("ver", "v2")]));

    assert!(changed);
    assert_eq!(existing.get("ver").map(String::as_str), Some("v2"));
    assert_eq!(existing.get("app").map(String::as_str), Some("web"));
}

#[test]
fn test_merge_labels_reports_no_change() {
    let mut existing = labels(&[("team", "a")]);
    assert!(!merge_labels(&mut existing, &labels(&[("team", "a")])));
    assert!(!merge_labels(&mut existing, &BTreeMap::new()));
}

#[test]
fn test_label_value() {
    let existing = labels(&[("team", "a")]);
    assert_eq!(label_value(&existing, "team"), Some("a"));
    assert_eq!(label_value(&existing, "missing"), None);
}

#[test]
fn test_cache_label_constants() {
    assert_eq!(CACHE_LABEL_KEY, "package-operator.run/cache");
    assert_eq!(CACHE_LABEL_VALUE, "True");
}
