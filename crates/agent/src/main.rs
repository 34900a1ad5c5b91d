//! Analytics Agent - service health analytics service
//!
//! Receives health samples from pollers, detects anomalies, forecasts trends
//! and periodically purges expired data.

use analytics_agent::{api, config::AgentConfig, retention};
use analytics_lib::{
    health::{components, HealthRegistry},
    AnalyticsConfig, AnalyticsEngine, InMemoryStore, MetricsStore, SqliteStore,
    StructuredLogger,
};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting analytics-agent");

    let config = AgentConfig::load()?;
    let analytics_config = AnalyticsConfig::load(config.analytics_config_file.as_deref());
    info!(
        instance = %config.instance_name,
        database = %config.database_path.display(),
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::RETENTION);

    let (store, store_kind, fallback) = open_store(&config);

    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(AGENT_VERSION, analytics_config.enabled, store_kind);

    let engine = Arc::new(
        AnalyticsEngine::new(store, analytics_config)
            .with_health(health_registry.clone())
            .with_logger(logger.clone()),
    );
    if let Some(reason) = fallback {
        health_registry.set_degraded(components::METRICS_STORE, reason);
    }

    let app_state = Arc::new(api::AppState::new(engine.clone(), health_registry.clone()));

    health_registry.set_ready(true);

    let cleanup_handle = tokio::spawn(retention::retention_loop(
        engine.clone(),
        health_registry.clone(),
        Duration::from_secs(config.cleanup_interval_secs),
    ));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            match result {
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API server task panicked"),
                Ok(Ok(())) => {}
            }
            logger.log_shutdown("API server stopped");
        }
    }

    health_registry.set_ready(false);
    cleanup_handle.abort();
    info!("Shutting down");

    Ok(())
}

/// Open the configured store, falling back to memory if SQLite cannot be opened
///
/// The third element explains a fallback.
fn open_store(config: &AgentConfig) -> (Arc<dyn MetricsStore>, &'static str, Option<String>) {
    if config.uses_in_memory_store() {
        return (Arc::new(InMemoryStore::new()), "memory", None);
    }

    match SqliteStore::open(&config.database_path) {
        Ok(store) => (Arc::new(store), "sqlite", None),
        Err(e) => {
            warn!(
                event = "store_fallback",
                path = %config.database_path.display(),
                error = %e,
                "Failed to open SQLite database, keeping metrics in memory"
            );
            (
                Arc::new(InMemoryStore::new()),
                "memory",
                Some(format!("sqlite unavailable, using memory: {e}")),
            )
        }
    }
}
