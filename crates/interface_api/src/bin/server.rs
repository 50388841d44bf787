//! Prior-Authorization Rules Service - Server Binary
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration (in-memory tracker, embedded rules)
//! cargo run --bin prior-auth-rules
//!
//! # Diagnostic mode
//! cargo run --bin prior-auth-rules -- debug
//! debug=true cargo run --bin prior-auth-rules
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_LOG_LEVEL` - Log filter when `RUST_LOG` is unset (default: info)
//! * `API_LOG_JSON` - Emit JSON log lines (default: false)
//! * `API_PROPERTIES_FILE` - Property file (default: config.properties)
//! * `API_RULES_FILE` - Rules document; the embedded table when unset
//! * `API_TRACKER_BACKEND` - `memory` or `postgres` (default: memory)
//! * `API_DATABASE_URL` - PostgreSQL connection string for the postgres backend
//! * `API_DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! * `API_REQUEST_TIMEOUT_SECS` - Per-request deadline (default: 30)
//! * `API_MAX_MERGE_RETRIES` - Re-evaluations after a lost race (default: 3)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::StdRandom;
use domain_priorauth::{
    DecisionEngine, EngineConfig, InMemorySubmissionTracker, JsonRuleSource, RulesTable,
    SubmissionTracker,
};
use infra_db::{create_pool, run_migrations, PostgresSubmissionTracker};
use interface_api::config::{debug_mode_requested, ApiConfig, ServiceProperties, TrackerBackend};
use interface_api::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("invalid API_* configuration")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let debug_mode = debug_mode_requested(&args, std::env::var("debug").ok().as_deref());
    init_tracing(&config.log_level, config.log_json, debug_mode);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        tracker = %config.tracker_backend,
        debug_mode,
        "Starting prior-authorization rules service"
    );

    let properties = ServiceProperties::load(&config.properties_file);

    let rules = Arc::new(load_rules(&config)?);
    let tracker = build_tracker(&config).await?;
    let engine = DecisionEngine::new(
        rules,
        tracker,
        EngineConfig {
            max_merge_retries: config.max_merge_retries,
        },
    )?;

    let app = create_router(AppState::new(engine, properties, config.clone()));

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid listen address {}", config.server_addr()))?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber
///
/// Diagnostic mode forces the `debug` filter.
fn init_tracing(log_level: &str, json: bool, debug_mode: bool) {
    let filter = if debug_mode {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(log_level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_target(true)))
        .init();
}

/// Populates the rules table; failure is fatal
fn load_rules(config: &ApiConfig) -> anyhow::Result<RulesTable> {
    let source = match &config.rules_file {
        Some(path) => JsonRuleSource::from_file(path),
        None => JsonRuleSource::embedded_default(),
    };
    let table = RulesTable::new(source, Arc::new(StdRandom::from_entropy()));
    let count = table.populate().context("failed to load rules")?;
    tracing::info!(rules = count, "Rules table populated");
    Ok(table)
}

async fn build_tracker(config: &ApiConfig) -> anyhow::Result<Arc<dyn SubmissionTracker>> {
    match config.tracker_backend {
        TrackerBackend::Memory => Ok(Arc::new(InMemorySubmissionTracker::new())),
        TrackerBackend::Postgres => {
            let pool = create_pool(config.database_config())
                .await
                .context("failed to connect to the tracker database")?;
            run_migrations(&pool).await?;
            Ok(Arc::new(PostgresSubmissionTracker::new(pool)))
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
