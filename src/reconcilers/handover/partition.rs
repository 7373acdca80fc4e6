// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ordering of handover partitions.

use crate::crd::{PartitionOrderType, PartitionOrderingSpec};
use std::collections::BTreeSet;

/// Orders the distinct partition values found among the candidates.
///
/// - `Static`: the listed values first, in the listed order, then every
///   other value in lexical order. Listed values are kept even when no
///   object carries them, so their partition reports zero counts.
/// - `AlphaNumeric`: lexical order.
/// - `Numeric`: values parsing as integers in ascending numeric order, then
///   the rest in lexical order.
#[must_use]
pub fn order_partitions<'a>(
    values: impl IntoIterator<Item = &'a str>,
    ordering: &PartitionOrderingSpec,
) -> Vec<String> {
    let present: BTreeSet<&str> = values.into_iter().filter(|v| !v.is_empty()).collect();

    match ordering.r#type {
        PartitionOrderType::Static => {
            let mut ordered: Vec<String> = Vec::with_capacity(present.len());
            for value in &ordering.static_ {
                if !ordered.contains(value) {
                    ordered.push(value.clone());
                }
            }
            for value in present {
                if !ordering.static_.iter().any(|s| s == value) {
                    ordered.push(value.to_string());
                }
            }
            ordered
        }
        PartitionOrderType::AlphaNumeric => present.into_iter().map(str::to_string).collect(),
        PartitionOrderType::Numeric => {
            let mut numeric: Vec<(i64, &str)> = Vec::new();
            let mut other: Vec<&str> = Vec::new();
            for value in present {
                match value.parse::<i64>() {
                    Ok(n) => numeric.push((n, value)),
                    Err(_) => other.push(value),
                }
            }
            numeric.sort_unstable();
            numeric
                .into_iter()
                .map(|(_, value)| value)
                .chain(other)
                .map(str::to_string)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordering(r#type: PartitionOrderType, static_: &[&str]) -> PartitionOrderingSpec {
        PartitionOrderingSpec {
            r#type,
            static_: static_.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn test_static_prepends_listed_values() {
        let order = order_partitions(
            ["b", "z", "a", "b", "prod"],
            &ordering(PartitionOrderType::Static, &["prod", "stage"]),
        );
        assert_eq!(order, vec!["prod", "stage", "a", "b", "z"]);
    }

    #[test]
    fn test_static_list_is_deduplicated() {
        let order = order_partitions(["x"], &ordering(PartitionOrderType::Static, &["a", "a"]));
        assert_eq!(order, vec!["a", "x"]);
    }

    #[test]
    fn test_alphanumeric_is_lexical() {
        let order = order_partitions(
            ["10", "9", "b", "a"],
            &ordering(PartitionOrderType::AlphaNumeric, &["ignored"]),
        );
        assert_eq!(order, vec!["10", "9", "a", "b"]);
    }

    #[test]
    fn test_numeric_sorts_numbers_then_rest() {
        let order = order_partitions(
            ["10", "9", "-1", "b", "a", "9"],
            &ordering(PartitionOrderType::Numeric, &[]),
        );
        assert_eq!(order, vec!["-1", "9", "10", "a", "b"]);
    }

    #[test]
    fn test_empty_values_are_skipped() {
        let order = order_partitions(["", "a"], &ordering(PartitionOrderType::AlphaNumeric, &[]));
        assert_eq!(order, vec!["a"]);
    }
}
