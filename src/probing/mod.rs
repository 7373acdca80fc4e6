// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Availability probes over untyped objects.
//!
//! A [`Prober`] judges whether a single target object is available. Probes
//! compose: selector wrappers scope a probe to a subset of objects, the
//! observed-generation wrapper short-circuits on stale status, and
//! [`AndProbe`] requires every child to pass.
//!
//! Probe specs from a coordination object are turned into one composed
//! prober by [`parse::parse_probes`].
//!
//! # Example
//!
//! ```rust
//! use package_coordination::probing::{AndProbe, ConditionProbe, Prober};
//! use serde_json::json;
//!
//! let probe = AndProbe::new(vec![Box::new(ConditionProbe::new("Available", "True"))]);
//! let object = json!({
//!     "metadata": {"generation": 1},
//!     "status": {"conditions": [{"type": "Available", "status": "True"}]}
//! });
//! assert!(probe.probe(&object).success);
//! ```

pub mod cel;
pub mod parse;

pub use cel::CelProbe;
pub use parse::{parse_object_set_probes, parse_probes};

use crate::selector::Selector;
use crate::unstructured::{generation, group_kind, labels, nested_field, nested_i64, split_dotted};
use serde_json::Value;
use std::fmt;

/// Outcome of probing one object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub success: bool,
    pub messages: Vec<String>,
}

impl ProbeResult {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            messages: Vec::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            messages: vec![message.into()],
        }
    }

    /// All messages joined for display.
    #[must_use]
    pub fn message(&self) -> String {
        self.messages.join(", ")
    }
}

/// Judges the availability of an object held as a JSON tree.
pub trait Prober: Send + Sync + fmt::Debug {
    fn probe(&self, object: &Value) -> ProbeResult;
}

/// Succeeds iff every child succeeds; failure messages of all failing
/// children are collected in order.
#[derive(Debug, Default)]
pub struct AndProbe {
    probes: Vec<Box<dyn Prober>>,
}

impl AndProbe {
    #[must_use]
    pub fn new(probes: Vec<Box<dyn Prober>>) -> Self {
        Self { probes }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

impl Prober for AndProbe {
    fn probe(&self, object: &Value) -> ProbeResult {
        let messages: Vec<String> = self
            .probes
            .iter()
            .map(|p| p.probe(object))
            .filter(|r| !r.success)
            .flat_map(|r| r.messages)
            .collect();

        ProbeResult {
            success: messages.is_empty(),
            messages,
        }
    }
}

/// Checks that `.status.conditions` reports `type` with `status` for the
/// current generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionProbe {
    r#type: String,
    status: String,
}

impl ConditionProbe {
    pub fn new(r#type: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            r#type: r#type.into(),
            status: status.into(),
        }
    }

    fn check(&self, object: &Value) -> Result<(), &'static str> {
        let conditions = nested_field(object, &["status", "conditions"])
            .ok_or("missing .status.conditions")?
            .as_array()
            .ok_or("malformed")?;

        for condition in conditions {
            let condition = condition.as_object().ok_or("malformed")?;
            if condition.get("type").and_then(Value::as_str) != Some(self.r#type.as_str()) {
                continue;
            }

            if let Some(observed) = condition.get("observedGeneration").and_then(Value::as_i64) {
                if observed != generation(object) {
                    return Err("outdated");
                }
            }

            return if condition.get("status").and_then(Value::as_str) == Some(self.status.as_str())
            {
                Ok(())
            } else {
                Err("wrong status")
            };
        }
        Err("not reported")
    }
}

impl Prober for ConditionProbe {
    fn probe(&self, object: &Value) -> ProbeResult {
        match self.check(object) {
            Ok(()) => ProbeResult::ok(),
            Err(reason) => ProbeResult::fail(format!(
                "condition {:?} == {:?}: {reason}",
                self.r#type, self.status
            )),
        }
    }
}

/// Checks that the values under two dotted paths are deep-equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldsEqualProbe {
    field_a: String,
    field_b: String,
}

impl FieldsEqualProbe {
    pub fn new(field_a: impl Into<String>, field_b: impl Into<String>) -> Self {
        Self {
            field_a: field_a.into(),
            field_b: field_b.into(),
        }
    }
}

impl Prober for FieldsEqualProbe {
    fn probe(&self, object: &Value) -> ProbeResult {
        let prefix = format!("{:?} == {:?}", self.field_a, self.field_b);

        let Some(a) = nested_field(object, &split_dotted(&self.field_a)) else {
            return ProbeResult::fail(format!("{prefix}: {:?} missing", self.field_a));
        };
        let Some(b) = nested_field(object, &split_dotted(&self.field_b)) else {
            return ProbeResult::fail(format!("{prefix}: {:?} missing", self.field_b));
        };

        if a == b {
            ProbeResult::ok()
        } else {
            ProbeResult::fail(format!("{prefix}: {a} != {b}"))
        }
    }
}

/// Fails with `.status outdated` when `.status.observedGeneration` is set and
/// differs from `.metadata.generation`; otherwise defers to the wrapped probe.
#[derive(Debug)]
pub struct ObservedGenerationProbe {
    inner: Box<dyn Prober>,
}

impl ObservedGenerationProbe {
    #[must_use]
    pub fn new(inner: Box<dyn Prober>) -> Self {
        Self { inner }
    }
}

impl Prober for ObservedGenerationProbe {
    fn probe(&self, object: &Value) -> ProbeResult {
        if let Some(observed) = nested_i64(object, &["status", "observedGeneration"]) {
            if observed != generation(object) {
                return ProbeResult::fail(".status outdated");
            }
        }
        self.inner.probe(object)
    }
}

/// Applies the wrapped probe only to objects of one group and kind.
#[derive(Debug)]
pub struct GroupKindSelectorProbe {
    group: String,
    kind: String,
    inner: Box<dyn Prober>,
}

impl GroupKindSelectorProbe {
    pub fn new(group: impl Into<String>, kind: impl Into<String>, inner: Box<dyn Prober>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
            inner,
        }
    }
}

impl Prober for GroupKindSelectorProbe {
    fn probe(&self, object: &Value) -> ProbeResult {
        let (group, kind) = group_kind(object);
        if group != self.group || kind != self.kind {
            // Not in scope of this probe
            return ProbeResult::ok();
        }
        self.inner.probe(object)
    }
}

/// Applies the wrapped probe only to objects matching a label selector.
#[derive(Debug)]
pub struct LabelSelectorProbe {
    selector: Selector,
    inner: Box<dyn Prober>,
}

impl LabelSelectorProbe {
    #[must_use]
    pub fn new(selector: Selector, inner: Box<dyn Prober>) -> Self {
        Self { selector, inner }
    }
}

impl Prober for LabelSelectorProbe {
    fn probe(&self, object: &Value) -> ProbeResult {
        if !self.selector.matches(&labels(object)) {
            return ProbeResult::ok();
        }
        self.inner.probe(object)
    }
}
