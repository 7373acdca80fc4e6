// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Schema-free accessors for objects held as JSON trees.
//!
//! Target kinds are only known at runtime, so probes and the handover engine
//! read them through these helpers instead of typed structs.
//!
//! Paths come in two flavours:
//!
//! - dotted field paths such as `.status.observedGeneration`, used by probes
//! - JSONPath-like expressions such as `{.status.ver}` or `.status.items[0].name`,
//!   used for `observedLabelValuePath`. Missing keys yield no values instead of
//!   an error; `[*]` fans out over every element of an array.

use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// A JSONPath expression could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid path {path:?}: {reason}")]
pub struct PathError {
    pub path: String,
    pub reason: String,
}

/// Splits a dotted path, ignoring leading and trailing dots.
#[must_use]
pub fn split_dotted(path: &str) -> Vec<&str> {
    path.trim_matches('.')
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Walks nested maps along `fields`.
#[must_use]
pub fn nested_field<'a>(object: &'a Value, fields: &[&str]) -> Option<&'a Value> {
    fields
        .iter()
        .try_fold(object, |current, field| current.as_object()?.get(*field))
}

/// Reads an integer along `fields`.
#[must_use]
pub fn nested_i64(object: &Value, fields: &[&str]) -> Option<i64> {
    nested_field(object, fields).and_then(Value::as_i64)
}

/// `.metadata.generation`, zero when unset.
#[must_use]
pub fn generation(object: &Value) -> i64 {
    nested_i64(object, &["metadata", "generation"]).unwrap_or_default()
}

/// `.metadata.labels` as a string map; non-string values are skipped.
#[must_use]
pub fn labels(object: &Value) -> BTreeMap<String, String> {
    nested_field(object, &["metadata", "labels"])
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// API group and kind of an object, derived from `apiVersion` and `kind`.
#[must_use]
pub fn group_kind(object: &Value) -> (String, String) {
    let api_version = object
        .get("apiVersion")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let group = match api_version.split_once('/') {
        Some((group, _)) => group.to_string(),
        None => String::new(),
    };
    let kind = object
        .get("kind")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    (group, kind)
}

/// Renders a resolved value the way `kubectl -o jsonpath` prints it.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Serializes a dynamic object into a JSON tree, filling in `apiVersion` and
/// `kind` from `gvk` when the object does not carry them.
#[must_use]
pub fn to_unstructured(object: &DynamicObject, gvk: &GroupVersionKind) -> Value {
    let mut value = serde_json::to_value(object).unwrap_or(Value::Null);
    if let Some(map) = value.as_object_mut() {
        map.entry("apiVersion")
            .or_insert_with(|| Value::String(gvk.api_version()));
        map.entry("kind")
            .or_insert_with(|| Value::String(gvk.kind.clone()));
    }
    value
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Field(String),
    Index(usize),
    Wildcard,
}

fn parse_path(path: &str) -> Result<Vec<Step>, PathError> {
    let error = |reason: &str| PathError {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let mut expr = path.trim();
    if let Some(inner) = expr.strip_prefix('{') {
        expr = inner.strip_suffix('}').ok_or_else(|| error("unbalanced braces"))?;
    }
    let expr = expr.trim().trim_start_matches('$');

    let mut steps = Vec::new();
    for segment in expr.split('.').filter(|s| !s.is_empty()) {
        let (field, mut rest) = match segment.find('[') {
            Some(idx) => segment.split_at(idx),
            None => (segment, ""),
        };
        if !field.is_empty() {
            steps.push(Step::Field(field.to_string()));
        }
        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(|| error("unbalanced brackets"))?;
            let selector = &rest[1..close];
            if selector == "*" {
                steps.push(Step::Wildcard);
            } else {
                let index = selector
                    .parse::<usize>()
                    .map_err(|_| error("array index must be a non-negative integer or *"))?;
                steps.push(Step::Index(index));
            }
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(error("unexpected characters after ]"));
            }
        }
    }
    Ok(steps)
}

fn step_values<'a>(value: &'a Value, step: &Step) -> Vec<&'a Value> {
    match step {
        Step::Field(name) => value.get(name.as_str()).into_iter().collect(),
        Step::Index(index) => value.get(*index).into_iter().collect(),
        Step::Wildcard => match value {
            Value::Array(items) => items.iter().collect(),
            Value::Object(map) => map.values().collect(),
            _ => Vec::new(),
        },
    }
}

/// Evaluates a JSONPath-like expression, returning every value it resolves to.
///
/// Missing keys and out-of-range indices resolve to nothing.
///
/// # Errors
///
/// Returns [`PathError`] when the expression is malformed.
pub fn resolve_path<'a>(object: &'a Value, path: &str) -> Result<Vec<&'a Value>, PathError> {
    let steps = parse_path(path)?;
    let mut current = vec![object];
    for step in &steps {
        current = current
            .into_iter()
            .flat_map(|value| step_values(value, step))
            .collect();
    }
    Ok(current)
}

#[cfg(test)]
#[path = "unstructured_tests.rs"]
mod unstructured_tests;
