//! Intent Engine - cross-chain intent execution service
//!
//! Accepts execution requests ("run these calls on the target chain, funded
//! from the source chain, with these token amounts delivered"), submits them
//! as intents to an external execution network and tracks each one to a
//! terminal settlement status.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod account;
mod api;
mod bundle;
mod config;
mod engine;
mod error;
mod intent;
mod metrics;
mod orchestrator;
mod tracker;

use account::OwnerSet;
use config::Settings;
use engine::IntentEngine;
use metrics::MetricsServer;
use orchestrator::OrchestratorClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Intent Engine v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for {} chains",
        settings.enabled_chains().len()
    );

    // Parse owner credentials up front; a bad key should fail startup, not
    // the first submission.
    let owners = Arc::new(OwnerSet::parse(&settings.account.owner_keys)?);
    info!("Owner set parsed ({} keys)", owners.len());

    // Execution network client, shared by all in-flight intents
    let network = Arc::new(OrchestratorClient::new(&settings.orchestrator)?);
    info!("Orchestrator client initialized");

    // Metrics server
    let metrics_server = if settings.metrics.enabled {
        Some(MetricsServer::new(settings.metrics.port))
    } else {
        None
    };

    // Intent engine
    let engine = Arc::new(IntentEngine::new(network, settings.clone())?);
    info!(
        "Engine initialized, counterfactual account {}",
        engine.derive_account(&owners)
    );

    // Start API server
    let api_handle = tokio::spawn({
        let api_config = settings.api.clone();
        let engine = engine.clone();
        let owners = owners.clone();
        async move {
            if let Err(e) = api::run_server(api_config, engine, owners).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = metrics_server.map(|server| {
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        })
    });

    // Periodic eviction of settled records past their TTL
    let cleanup_handle = tokio::spawn({
        let engine = engine.clone();
        async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                let evicted = engine.evict_settled();
                if evicted > 0 {
                    info!("Evicted {} settled intent records", evicted);
                }
            }
        }
    });

    info!("Intent Engine is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // In-flight tracking is local observation only; stopping never retracts
    // a submitted intent from the execution network.
    api_handle.abort();
    cleanup_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Intent Engine stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,intent_engine=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
