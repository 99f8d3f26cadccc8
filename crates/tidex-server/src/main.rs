//! tidex export service
//!
//! Reads `TIDEX_*` settings from the environment, installs the tracing
//! subscriber and serves the export router until Ctrl-C.

use std::sync::Arc;

use tidex::{
    DataExportService, ServiceConfig, TidexAppState, create_tidex_router,
    config::LoggingConfig,
    infrastructure::adapters::{
        HttpBucketClient, MemoryDocumentStore, PermissionTable, SessionTable,
    },
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = ServiceConfig::from_env()?;
    init_tracing(&config.logging);

    let addr = config.socket_addr()?;
    let store = Arc::new(MemoryDocumentStore::new());
    let remote = Arc::new(HttpBucketClient::new(
        config.remote.base_url.clone(),
        config.remote.timeout(),
    )?);

    let service = DataExportService::new(
        store.clone(),
        remote,
        store,
        PermissionTable::new(),
        config.export.clone(),
        config.tir.clone(),
    );

    let app = create_tidex_router::<MemoryDocumentStore, HttpBucketClient, MemoryDocumentStore, PermissionTable>(&config.http)
        .with_state(TidexAppState::new(service, SessionTable::new()));

    info!(
        %addr,
        remote = %config.remote.base_url,
        excluded_types = ?config.export.exclude_types,
        parameter_levels = ?config.export.parameter_levels,
        "tidex listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("tidex stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
