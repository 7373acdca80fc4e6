// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Condition types, reasons and phases reported by coordination objects.
//!
//! Conditions are the API contract. The `phase` field only mirrors them for
//! console display.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   phase: Progressing
//!   conditions:
//!     - type: Completed
//!       status: "False"
//!       reason: Incomplete
//!       message: "Some found objects need to be re-labeled."
//!       observedGeneration: 3
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// Adoption objects report `Active=True` once a strategy has been applied.
pub const CONDITION_TYPE_ACTIVE: &str = "Active";

/// Handover objects report `Completed=True` once every found object carries the new label value.
pub const CONDITION_TYPE_COMPLETED: &str = "Completed";

// ============================================================================
// Condition Statuses
// ============================================================================

/// Condition status `True`
pub const CONDITION_STATUS_TRUE: &str = "True";

/// Condition status `False`
pub const CONDITION_STATUS_FALSE: &str = "False";

// ============================================================================
// Adoption Reasons
// ============================================================================

/// The static label set was applied to every unlabeled target object.
pub const REASON_STATIC_STRATEGY_APPLIED: &str = "StaticStrategyApplied";

/// Round-robin label options were distributed across every unlabeled target object.
pub const REASON_ROUND_ROBIN_STRATEGY_APPLIED: &str = "RoundRobinStrategyApplied";

// ============================================================================
// Handover Reasons
// ============================================================================

/// Every found object carries the new label value.
pub const REASON_COMPLETE: &str = "Complete";

/// Some found objects still carry the initial label value.
pub const REASON_INCOMPLETE: &str = "Incomplete";

/// Message attached to [`REASON_COMPLETE`].
pub const MESSAGE_COMPLETE: &str = "All found objects have been re-labeled.";

/// Message attached to [`REASON_INCOMPLETE`].
pub const MESSAGE_INCOMPLETE: &str = "Some found objects need to be re-labeled.";

// ============================================================================
// Error Reasons
// ============================================================================

/// The spec is missing a required strategy variant or violates a bound.
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";

/// The availability probes could not be parsed or compiled.
pub const REASON_PROBE_PARSE_ERROR: &str = "ProbeParseError";

// ============================================================================
// Phases
// ============================================================================

/// No reconcile has produced a terminal condition yet.
pub const PHASE_PENDING: &str = "Pending";

/// Adoption strategy is applied.
pub const PHASE_ACTIVE: &str = "Active";

/// Handover still has objects to migrate.
pub const PHASE_PROGRESSING: &str = "Progressing";

/// Handover finished.
pub const PHASE_COMPLETED: &str = "Completed";
