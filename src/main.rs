// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use futures::StreamExt;
use kube::{
    runtime::{
        controller::Action,
        reflector,
        watcher::{self, Config},
        Controller, WatchStreamExt,
    },
    Api, Client, Resource, ResourceExt,
};
use package_coordination::{
    config::{Cli, OperatorConfig},
    constants::{
        ERROR_REQUEUE_DURATION_SECS, HEALTHZ_PATH, METRICS_PATH, READYZ_PATH,
        TOKIO_WORKER_THREADS,
    },
    context::Context,
    coordination::CoordinationObject,
    crd::{Adoption, ClusterAdoption, ClusterHandover},
    dynamic_cache::enqueue_watching_objects,
    metrics,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("coordination-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

fn init_tracing() {
    // Respects RUST_LOG, defaulting to INFO.
    // RUST_LOG_FORMAT=json switches to JSON output.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    info!("Starting package coordination controller");
    debug!(?cli, "Parsed command line");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let ctx = Arc::new(Context::new(client, cli.clone(), OperatorConfig::default()));

    info!("Starting all controllers");

    // Controllers should never exit - if one does, log it and exit the process
    tokio::select! {
        result = run_adoption_controller(ctx.clone()), if !cli.disable_adoption => {
            error!("CRITICAL: Adoption controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Adoption controller exited unexpectedly without error")
        }
        result = run_cluster_adoption_controller(ctx.clone()), if !cli.disable_adoption => {
            error!("CRITICAL: ClusterAdoption controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ClusterAdoption controller exited unexpectedly without error")
        }
        result = run_handover_controller(ctx.clone()), if !cli.disable_handover => {
            error!("CRITICAL: ClusterHandover controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ClusterHandover controller exited unexpectedly without error")
        }
        result = serve_http(cli.metrics_bind_address) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
    }
}

/// Serve `/metrics`, `/healthz` and `/readyz`.
async fn serve_http(addr: SocketAddr) -> Result<()> {
    let app = Router::new()
        .route(METRICS_PATH, get(metrics_handler))
        .route(HEALTHZ_PATH, get(|| async { "ok" }))
        .route(READYZ_PATH, get(|| async { "ok" }));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding metrics server to {addr}"))?;
    info!(addr = %addr, "Metrics server started");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    metrics::gather_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Run the `Adoption` controller
async fn run_adoption_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting Adoption controller");

    let api = Api::<Adoption>::all(ctx.client.clone());

    Controller::new(api, Config::default())
        .reconcile_on(enqueue_watching_objects::<Adoption, _>(
            ctx.cache.clone(),
            ctx.cache.source(),
        ))
        .run(reconcile_adoption_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `ClusterAdoption` controller
async fn run_cluster_adoption_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting ClusterAdoption controller");

    let api = Api::<ClusterAdoption>::all(ctx.client.clone());

    Controller::new(api, Config::default())
        .reconcile_on(enqueue_watching_objects::<ClusterAdoption, _>(
            ctx.cache.clone(),
            ctx.cache.source(),
        ))
        .run(reconcile_cluster_adoption_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `ClusterHandover` controller
///
/// Only spec changes of the handover itself trigger a reconcile; status
/// writes by the controller do not. Target object changes still arrive
/// through the dynamic cache.
async fn run_handover_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting ClusterHandover controller");

    let api = Api::<ClusterHandover>::all(ctx.client.clone());
    let (reader, writer) = reflector::store();
    let handovers = watcher::watcher(api, Config::default())
        .default_backoff()
        .reflect(writer)
        .applied_objects();

    Controller::for_stream(generation_changed(handovers), reader)
        .reconcile_on(enqueue_watching_objects::<ClusterHandover, _>(
            ctx.cache.clone(),
            ctx.cache.source(),
        ))
        .run(reconcile_handover_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Drops objects whose `.metadata.generation` was already seen.
///
/// Objects being deleted always pass and are forgotten, so the map does not
/// outlive them.
fn generation_changed<K, S>(stream: S) -> impl futures::Stream<Item = Result<K, watcher::Error>>
where
    K: Resource,
    S: futures::Stream<Item = Result<K, watcher::Error>>,
{
    let mut seen: HashMap<String, i64> = HashMap::new();
    stream.filter(move |event| {
        let changed = match event {
            Ok(object) => {
                let key = object.uid().unwrap_or_else(|| object.name_any());
                match object.meta().generation {
                    _ if object.meta().deletion_timestamp.is_some() => {
                        seen.remove(&key);
                        true
                    }
                    Some(generation) => seen.insert(key, generation) != Some(generation),
                    None => true,
                }
            }
            Err(_) => true,
        };
        futures::future::ready(changed)
    })
}

/// Requeue interval depending on whether the object reached its goal.
fn requeue_action<K: CoordinationObject>(ctx: &Context, object: &K) -> Action {
    if object.is_terminal() {
        debug!("{} {} is settled, requeueing later", K::KIND, object.name_any());
        metrics::record_reconciliation_requeue(K::KIND, "ready");
        Action::requeue(ctx.cli.requeue_ready())
    } else {
        debug!("{} {} is progressing, requeueing soon", K::KIND, object.name_any());
        metrics::record_reconciliation_requeue(K::KIND, "not_ready");
        Action::requeue(ctx.cli.requeue_not_ready())
    }
}

fn record_outcome<K: CoordinationObject>(
    ctx: &Context,
    name: &str,
    start: Instant,
    result: Result<K>,
) -> Result<Action, ReconcileError> {
    match result {
        Ok(reconciled) => {
            info!("Successfully reconciled {}: {}", K::KIND, name);
            metrics::record_reconciliation_success(K::KIND, start.elapsed());
            Ok(requeue_action(ctx, &reconciled))
        }
        Err(e) => {
            error!("Failed to reconcile {} {}: {:#}", K::KIND, name, e);
            metrics::record_reconciliation_error(K::KIND, start.elapsed());
            Err(e.into())
        }
    }
}

/// Reconcile wrapper for `Adoption`
async fn reconcile_adoption_wrapper(
    adoption: Arc<Adoption>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let name = adoption.name_any();
    debug!(
        name = %name,
        namespace = ?adoption.namespace(),
        "Reconcile wrapper called for Adoption"
    );

    let result = ctx.adoptions.reconcile((*adoption).clone()).await;
    record_outcome(&ctx, &name, start, result)
}

/// Reconcile wrapper for `ClusterAdoption`
async fn reconcile_cluster_adoption_wrapper(
    adoption: Arc<ClusterAdoption>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let name = adoption.name_any();

    let result = ctx.cluster_adoptions.reconcile((*adoption).clone()).await;
    record_outcome(&ctx, &name, start, result)
}

/// Reconcile wrapper for `ClusterHandover`
async fn reconcile_handover_wrapper(
    handover: Arc<ClusterHandover>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let name = handover.name_any();

    let result = ctx.handovers.reconcile((*handover).clone()).await;
    record_outcome(&ctx, &name, start, result)
}

/// Error policy for all controllers
fn error_policy<K: CoordinationObject>(
    object: Arc<K>,
    err: &ReconcileError,
    _ctx: Arc<Context>,
) -> Action {
    warn!(
        "Requeueing {} {} after error: {}",
        K::KIND,
        object.name_any(),
        err
    );
    metrics::record_error(K::KIND, "reconcile_error");
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}
