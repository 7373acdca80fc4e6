// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the dynamic cache, probe parsing and spec validation.
//!
//! Reconcilers wrap these in `anyhow::Error` with context. Probe and spec
//! errors are not retried blindly: they are surfaced as conditions on the
//! coordination object and wait for the next spec change.

use thiserror::Error;

/// Errors returned by the dynamic cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Starting the informer for a kind failed
    #[error("starting watch for {gvk}: {reason}")]
    WatchStart {
        /// Kind being watched, rendered as `group/version, Kind=kind`
        gvk: String,
        /// Underlying cause
        reason: String,
    },

    /// Releasing an owner's watches failed
    #[error("freeing cache for {owner}: {reason}")]
    CacheFree {
        /// Owner whose references were being released
        owner: String,
        /// Underlying cause
        reason: String,
    },

    /// The kind is read before any owner called `watch` for it
    #[error("cache access for {gvk} before calling watch, can not read objects")]
    NotCached {
        /// Kind that was read
        gvk: String,
    },

    /// The informer backing a kind did not finish its initial list in time
    #[error("informer for {gvk} did not sync within {seconds}s")]
    SyncTimeout {
        /// Kind whose informer is still syncing
        gvk: String,
        /// Time waited
        seconds: u64,
    },

    /// The informer backing a kind stopped before its store was populated
    #[error("informer for {gvk} stopped before its store was ready")]
    InformerStopped {
        /// Kind whose informer stopped
        gvk: String,
    },
}

/// Errors raised while turning probe specs into a prober.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// A probe entry could not be parsed
    #[error("parsing probe: {0}")]
    ProbeParse(String),

    /// A CEL rule failed to compile
    #[error("compiling CEL rule {rule:?}: {reason}")]
    CelCompile {
        /// Rule as written in the spec
        rule: String,
        /// Compiler message
        reason: String,
    },

    /// A CEL rule does not produce a boolean
    #[error("CEL rule {rule:?} must evaluate to bool, got {actual}")]
    CelInvalidEvaluationType {
        /// Rule as written in the spec
        rule: String,
        /// Type the rule produced
        actual: String,
    },
}

/// Errors in a coordination object's spec that no retry can fix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// `targetAPI.version` or `targetAPI.kind` is empty
    #[error("targetAPI.{field} must not be empty")]
    EmptyTargetApiField {
        /// Offending field name
        field: &'static str,
    },

    /// The strategy type names a variant whose parameters are absent
    #[error("strategy type {strategy} requires .spec.strategy.{field} to be set")]
    MissingStrategy {
        /// Strategy type from the spec
        strategy: String,
        /// Field that must be populated
        field: &'static str,
    },

    /// Round-robin strategy without any options
    #[error("roundRobin.options must contain at least one label set")]
    EmptyRoundRobinOptions,

    /// A round-robin option without any label
    #[error("roundRobin.options[{0}] must contain at least one label")]
    EmptyRoundRobinOption(usize),

    /// `maxUnavailable` below one
    #[error("relabel.maxUnavailable must be at least 1, got {0}")]
    MaxUnavailableTooLow(i32),

    /// A required relabel field is empty
    #[error("relabel.{field} must not be empty")]
    EmptyRelabelField {
        /// Offending field name
        field: &'static str,
    },

    /// `initialValue` equals `toValue`
    #[error("relabel.initialValue and relabel.toValue must differ, both are {0:?}")]
    IdenticalRelabelValues(String),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
