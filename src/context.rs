// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all controllers.
//!
//! All controllers receive an `Arc<Context>` that contains:
//! - the Kubernetes client
//! - the dynamic cache shared by every engine
//! - one engine per coordination kind
//! - the command-line settings driving requeue intervals

use crate::config::{Cli, OperatorConfig};
use crate::crd::{Adoption, ClusterAdoption, ClusterHandover};
use crate::dynamic_cache::{DynamicCache, KubeInformerFactory};
use crate::reconcilers::{AdoptionEngine, HandoverEngine, KubeWriter};
use kube::Client;
use std::sync::Arc;

/// Shared context passed to all controllers.
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Informers for target kinds, shared by all engines
    pub cache: Arc<DynamicCache>,

    pub adoptions: AdoptionEngine<Adoption>,
    pub cluster_adoptions: AdoptionEngine<ClusterAdoption>,
    pub handovers: HandoverEngine<ClusterHandover>,

    /// Process settings
    pub cli: Cli,
}

impl Context {
    /// Wires the dynamic cache and the engines around one client.
    #[must_use]
    pub fn new(client: Client, cli: Cli, config: OperatorConfig) -> Self {
        let cache = Arc::new(DynamicCache::new(KubeInformerFactory::new(client.clone())));
        let writer = Arc::new(KubeWriter::new(client.clone()));

        Self {
            adoptions: AdoptionEngine::new(
                cache.clone(),
                writer.clone(),
                writer.clone(),
                config.clone(),
            ),
            cluster_adoptions: AdoptionEngine::new(
                cache.clone(),
                writer.clone(),
                writer.clone(),
                config.clone(),
            ),
            handovers: HandoverEngine::new(cache.clone(), writer.clone(), writer, config),
            client,
            cache,
            cli,
        }
    }
}
