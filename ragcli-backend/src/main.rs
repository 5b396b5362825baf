//! rag-backend - Background daemon serving the ragcli IPC socket

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use ragcli_backend::catalog::{CatalogQueryPort, InMemoryCatalog};
use ragcli_backend::health::HttpHealthPort;
use ragcli_backend::ports::IngestionPort;
use ragcli_backend::router::Router;
use ragcli_backend::{Backend, BackendArgs};
use ragcli_utils::{
    init_logging_with_config, GuardedHttpClient, LogConfig, OfflineGuard, Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = BackendArgs::parse().into_config();

    let mut log_config = if config.foreground {
        LogConfig::default()
    } else {
        LogConfig::backend()
    };
    log_config.filter = config.log_filter.clone();
    init_logging_with_config(log_config)?;

    // The backend only ever talks to local services; keep the guard
    // installed for the life of the process.
    let _offline_guard = OfflineGuard::install();

    let catalog = Arc::new(InMemoryCatalog::new(config.stream_queue_capacity));
    let query = Arc::new(CatalogQueryPort::new(Arc::clone(&catalog)));
    let health = Arc::new(HttpHealthPort::new(GuardedHttpClient::new()?));

    let router = Arc::new(
        Router::new(query, Arc::clone(&catalog) as Arc<dyn IngestionPort>).with_health(health),
    );

    let backend = Backend::bind(&config, router)?;
    info!("rag-backend ready");
    backend.run().await
}
