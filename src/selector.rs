// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label selector requirements and in-memory matching.
//!
//! The dynamic cache filters target objects with a [`Selector`] instead of
//! asking the API server, so selectors are evaluated locally against the
//! `.metadata.labels` map of each cached object.
//!
//! # Example
//!
//! ```rust
//! use package_coordination::selector::{Requirement, Selector};
//! use std::collections::BTreeMap;
//!
//! let selector = Selector::from_requirements([
//!     Requirement::does_not_exist("team"),
//!     Requirement::does_not_exist("owner"),
//! ]);
//! assert_eq!(selector.to_string(), "!owner,!team");
//! assert!(selector.matches(&BTreeMap::new()));
//! ```

use crate::crd::{LabelSelector, LabelSelectorRequirement};
use crate::errors::ProbeError;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Relationship between a label key and a set of values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// A single label requirement.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

impl Requirement {
    /// Matches objects whose label `key` is one of `values`.
    pub fn in_values<I, S>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            operator: Operator::In,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Matches objects whose label `key` is absent or not one of `values`.
    pub fn not_in<I, S>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            operator: Operator::NotIn,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Matches objects carrying label `key` with any value.
    pub fn exists(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operator: Operator::Exists,
            values: BTreeSet::new(),
        }
    }

    /// Matches objects without label `key`.
    pub fn does_not_exist(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operator: Operator::DoesNotExist,
            values: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Evaluates the requirement against a label map.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::In => value.is_some_and(|v| self.values.contains(v)),
            Operator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }

    fn from_spec(spec: &LabelSelectorRequirement) -> Result<Self, ProbeError> {
        let values = spec.values.clone().unwrap_or_default();
        match spec.operator.as_str() {
            "In" | "NotIn" if values.is_empty() => Err(ProbeError::ProbeParse(format!(
                "label selector requirement for {:?} with operator {} needs values",
                spec.key, spec.operator
            ))),
            "In" => Ok(Self::in_values(spec.key.clone(), values)),
            "NotIn" => Ok(Self::not_in(spec.key.clone(), values)),
            "Exists" | "DoesNotExist" if !values.is_empty() => Err(ProbeError::ProbeParse(
                format!(
                    "label selector requirement for {:?} with operator {} must not have values",
                    spec.key, spec.operator
                ),
            )),
            "Exists" => Ok(Self::exists(spec.key.clone())),
            "DoesNotExist" => Ok(Self::does_not_exist(spec.key.clone())),
            other => Err(ProbeError::ProbeParse(format!(
                "unknown label selector operator {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.values.iter().cloned().collect::<Vec<_>>().join(",");
        match self.operator {
            Operator::In => write!(f, "{} in ({values})", self.key),
            Operator::NotIn => write!(f, "{} notin ({values})", self.key),
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

/// A conjunction of requirements. The empty selector matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: BTreeSet<Requirement>,
}

impl Selector {
    /// Selector matching every object.
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    /// Builds a selector from requirements. Duplicates collapse and the
    /// requirements are kept ordered by key.
    pub fn from_requirements(requirements: impl IntoIterator<Item = Requirement>) -> Self {
        Self {
            requirements: requirements.into_iter().collect(),
        }
    }

    /// Selector requiring every key in `keys` to be absent.
    pub fn missing_all<'a>(keys: impl IntoIterator<Item = &'a String>) -> Self {
        Self::from_requirements(keys.into_iter().map(|k| Requirement::does_not_exist(k.clone())))
    }

    /// Converts a declarative selector into its requirements.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::ProbeParse`] for unknown operators or
    /// requirements whose values do not fit the operator.
    pub fn from_label_selector(selector: &LabelSelector) -> Result<Self, ProbeError> {
        let mut requirements = BTreeSet::new();
        for (key, value) in selector.match_labels.iter().flatten() {
            requirements.insert(Requirement::in_values(key.clone(), [value.clone()]));
        }
        for expression in selector.match_expressions.iter().flatten() {
            requirements.insert(Requirement::from_spec(expression)?);
        }
        Ok(Self { requirements })
    }

    /// True when the selector has no requirements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Iterates over the requirements ordered by key.
    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter()
    }

    /// Evaluates every requirement against a label map.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.requirements.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join(","))
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
