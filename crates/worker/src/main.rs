//! Outreach worker entry point
//!
//! Loads settings, wires the lead store and SMS transport, then runs the
//! outreach loop until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use leadflow_config::{load_settings, PersistenceConfig, Settings};
use leadflow_core::{Clock, LeadRecord, LeadStore, MessageTransport, SystemClock};
use leadflow_engine::{BatchSelector, ContactSequenceEngine, LeadScorer, OutreachRunner};
use leadflow_persistence::{connect_lead_store, InMemoryLeadStore, ScyllaConfig, SimulatedSmsTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("LEADFLOW_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => {
            // tracing is not initialized yet
            eprintln!(
                "Loaded configuration from files (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        }
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&config);

    tracing::info!("Starting leadflow worker v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        scopes = ?config.worker.scopes,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        init_metrics(config.observability.metrics_port)?;
    }

    let store = init_store(&config).await?;
    if let Ok(path) = std::env::var("LEADFLOW_SEED_FILE") {
        let inserted = seed_leads(store.as_ref(), Path::new(&path)).await?;
        tracing::info!(path = %path, inserted, "Seeded leads");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let transport: Arc<dyn MessageTransport> = Arc::new(SimulatedSmsTransport::new());
    tracing::info!(provider = transport.provider(), backend = store.backend(), "Collaborators wired");

    let engine = Arc::new(ContactSequenceEngine::new(
        store.clone(),
        transport,
        clock.clone(),
        config.sequence.clone(),
    ));
    let selector = Arc::new(
        BatchSelector::new(
            store.clone(),
            LeadScorer::new(config.scoring.clone()),
            clock.clone(),
            config.batch.clone(),
        )
        .with_max_cas_retries(config.sequence.max_cas_retries),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = OutreachRunner::new(store, engine, clock, config.worker.clone(), shutdown_rx)
        .with_selector(selector);
    let handle = tokio::spawn(runner.run());

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
    handle.await.context("outreach runner panicked")?;

    tracing::info!("Worker shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, finishing current step...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, finishing current step...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        // prefix match covers every leadflow_* crate
        format!("leadflow={}", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}

fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    leadflow_engine::metrics::register_metrics();
    tracing::info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}

async fn init_store(config: &Settings) -> anyhow::Result<Arc<dyn LeadStore>> {
    if !config.persistence.enabled {
        tracing::info!("Persistence disabled, using in-memory lead store");
        return Ok(Arc::new(InMemoryLeadStore::new()));
    }

    let store = connect_lead_store(scylla_config(&config.persistence))
        .await
        .context("failed to initialize ScyllaDB lead store")?;
    tracing::info!(
        hosts = ?config.persistence.scylla_hosts,
        keyspace = %config.persistence.keyspace,
        "ScyllaDB lead store initialized"
    );
    Ok(Arc::new(store))
}

fn scylla_config(persistence: &PersistenceConfig) -> ScyllaConfig {
    ScyllaConfig {
        hosts: persistence.scylla_hosts.clone(),
        keyspace: persistence.keyspace.clone(),
        replication_factor: persistence.replication_factor,
    }
}

/// Insert leads from a JSON array file; ids already present are skipped
async fn seed_leads(store: &dyn LeadStore, path: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let leads: Vec<LeadRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse seed file {}", path.display()))?;

    let mut inserted = 0;
    for lead in leads {
        if store.get(&lead.id).await?.is_some() {
            continue;
        }
        store.insert(lead).await?;
        inserted += 1;
    }
    Ok(inserted)
}
