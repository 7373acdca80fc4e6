// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for coordination objects.
//!
//! Conditions follow the usual Kubernetes conventions:
//! - `type`: The aspect being reported (`Active`, `Completed`)
//! - `status`: "True" or "False"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `observedGeneration`: The `.metadata.generation` the condition was computed for
//! - `lastTransitionTime`: RFC3339 timestamp of the last status change
//!
//! # Example
//!
//! ```rust
//! use package_coordination::reconcilers::status::{is_condition_true, set_condition};
//!
//! let mut conditions = Vec::new();
//! set_condition(&mut conditions, "Active", "True", "StaticStrategyApplied", "", Some(1));
//! assert!(is_condition_true(&conditions, "Active"));
//! ```

use crate::crd::Condition;
use crate::status_reasons::CONDITION_STATUS_TRUE;
use chrono::Utc;

/// Create a new condition stamped with the current time.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        observed_generation,
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// True if the condition exists and its status is `True`.
#[must_use]
pub fn is_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    find_condition(conditions, condition_type).is_some_and(|c| c.status == CONDITION_STATUS_TRUE)
}

/// Update or add a condition in place (no API call).
///
/// The `lastTransitionTime` is preserved when the status did not change and
/// refreshed when it did. Persisting is up to the caller.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.observed_generation = observed_generation;
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(
            condition_type,
            status,
            reason,
            message,
            observed_generation,
        ));
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
