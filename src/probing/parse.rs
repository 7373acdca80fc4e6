// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Turns declarative probe specs into one composed [`Prober`].
//!
//! Each [`Probe`] entry must populate exactly one variant; entries with no
//! variant are skipped. The resulting list is wrapped so that stale status
//! (`.status.observedGeneration` behind `.metadata.generation`) fails before
//! any individual probe runs.

use super::{
    AndProbe, CelProbe, ConditionProbe, FieldsEqualProbe, GroupKindSelectorProbe,
    LabelSelectorProbe, ObservedGenerationProbe, Prober,
};
use crate::crd::{ObjectSetProbe, Probe};
use crate::errors::ProbeError;
use crate::selector::Selector;

/// Parses a plain probe list into `ObservedGeneration(And(..))`.
///
/// # Errors
///
/// Returns [`ProbeError`] if an entry populates several variants, has empty
/// required fields, or carries a CEL rule that does not compile to a boolean.
pub fn parse_probes(probes: &[Probe]) -> Result<Box<dyn Prober>, ProbeError> {
    let mut parsed = Vec::with_capacity(probes.len());
    for (index, probe) in probes.iter().enumerate() {
        if let Some(prober) = parse_probe(probe).map_err(|e| at_index(index, e))? {
            parsed.push(prober);
        }
    }
    Ok(Box::new(ObservedGenerationProbe::new(Box::new(AndProbe::new(parsed)))))
}

/// Parses object-set probes. Each entry becomes
/// `GroupKindSelector(LabelSelector(ObservedGeneration(And(..))))`, dropping
/// the wrappers whose selector part is absent, and all entries are joined by `And`.
///
/// # Errors
///
/// Returns [`ProbeError`] for invalid probes or label selectors.
pub fn parse_object_set_probes(probes: &[ObjectSetProbe]) -> Result<Box<dyn Prober>, ProbeError> {
    let mut parsed: Vec<Box<dyn Prober>> = Vec::with_capacity(probes.len());
    for set in probes {
        let mut prober = parse_probes(&set.probes)?;

        if let Some(label_selector) = &set.selector.selector {
            let selector = Selector::from_label_selector(label_selector)?;
            prober = Box::new(LabelSelectorProbe::new(selector, prober));
        }
        if let Some(kind) = &set.selector.kind {
            prober = Box::new(GroupKindSelectorProbe::new(
                kind.group.clone(),
                kind.kind.clone(),
                prober,
            ));
        }
        parsed.push(prober);
    }
    Ok(Box::new(AndProbe::new(parsed)))
}

fn parse_probe(probe: &Probe) -> Result<Option<Box<dyn Prober>>, ProbeError> {
    let populated = [
        probe.condition.is_some(),
        probe.fields_equal.is_some(),
        probe.cel.is_some(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count();
    if populated > 1 {
        return Err(ProbeError::ProbeParse(
            "probe must set exactly one of condition, fieldsEqual, cel".to_string(),
        ));
    }

    if let Some(condition) = &probe.condition {
        if condition.r#type.is_empty() {
            return Err(ProbeError::ProbeParse(
                "condition probe requires a type".to_string(),
            ));
        }
        return Ok(Some(Box::new(ConditionProbe::new(
            condition.r#type.clone(),
            condition.status.clone(),
        ))));
    }

    if let Some(fields) = &probe.fields_equal {
        if fields.field_a.is_empty() || fields.field_b.is_empty() {
            return Err(ProbeError::ProbeParse(
                "fieldsEqual probe requires fieldA and fieldB".to_string(),
            ));
        }
        return Ok(Some(Box::new(FieldsEqualProbe::new(
            fields.field_a.clone(),
            fields.field_b.clone(),
        ))));
    }

    if let Some(cel) = &probe.cel {
        return Ok(Some(Box::new(CelProbe::new(
            cel.rule.clone(),
            cel.message.clone(),
        )?)));
    }

    Ok(None)
}

fn at_index(index: usize, error: ProbeError) -> ProbeError {
    match error {
        ProbeError::ProbeParse(reason) => ProbeError::ProbeParse(format!("probe {index}: {reason}")),
        other => other,
    }
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod parse_tests;
