// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration.
//!
//! [`OperatorConfig`] carries the process-wide identifiers (field manager,
//! finalizer, cache label) into every engine at construction time.
//! [`Cli`] is the command-line surface of the operator binary; every flag can
//! also be set through an environment variable.

use crate::constants::{
    CACHED_FINALIZER, DEFAULT_METRICS_BIND_ADDRESS, FIELD_MANAGER, REQUEUE_WHEN_NOT_READY_SECS,
    REQUEUE_WHEN_READY_SECS,
};
use crate::labels::{CACHE_LABEL_KEY, CACHE_LABEL_VALUE};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Identifiers shared by all engines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Field manager for server-side apply requests
    pub field_manager: String,
    /// Finalizer guarding dynamic cache cleanup
    pub cached_finalizer: String,
    /// Label key marking dynamic cache membership
    pub cache_label_key: String,
    /// Label value marking dynamic cache membership
    pub cache_label_value: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            field_manager: FIELD_MANAGER.to_string(),
            cached_finalizer: CACHED_FINALIZER.to_string(),
            cache_label_key: CACHE_LABEL_KEY.to_string(),
            cache_label_value: CACHE_LABEL_VALUE.to_string(),
        }
    }
}

/// Command-line arguments of the operator binary.
#[derive(Parser, Debug, Clone)]
#[command(name = "package-coordination", version, about = "Adoption and handover coordination operator")]
pub struct Cli {
    /// Address the metrics and health server binds to
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    pub metrics_bind_address: SocketAddr,

    /// Requeue interval in seconds once an object reached its terminal condition
    #[arg(long, env = "REQUEUE_READY_SECS", default_value_t = REQUEUE_WHEN_READY_SECS)]
    pub requeue_ready_secs: u64,

    /// Requeue interval in seconds while an object is still progressing
    #[arg(long, env = "REQUEUE_NOT_READY_SECS", default_value_t = REQUEUE_WHEN_NOT_READY_SECS)]
    pub requeue_not_ready_secs: u64,

    /// Disable the Adoption and ClusterAdoption controllers
    #[arg(long, env = "DISABLE_ADOPTION", default_value_t = false)]
    pub disable_adoption: bool,

    /// Disable the ClusterHandover controller
    #[arg(long, env = "DISABLE_HANDOVER", default_value_t = false)]
    pub disable_handover: bool,
}

impl Cli {
    /// Requeue interval for objects whose terminal condition is true.
    #[must_use]
    pub fn requeue_ready(&self) -> Duration {
        Duration::from_secs(self.requeue_ready_secs)
    }

    /// Requeue interval for objects that are still progressing.
    #[must_use]
    pub fn requeue_not_ready(&self) -> Duration {
        Duration::from_secs(self.requeue_not_ready_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
