//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Seed the store when explicitly asked to
//! - Load the task collection, failing hard when it is unavailable
//! - Bind the listener last, once everything else is ready

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::{load_config, ConfigError, ServiceConfig, StoreConfig};
use crate::store::{JsonFileStore, StoreError, TaskRepository};

/// Fatal startup failures.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Server(#[from] crate::http::ServerError),
}

/// Config from `path`, or the defaults when no file is given.
pub fn load_service_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => Ok(ServiceConfig::default()),
    }
}

/// Open the task collection. An absent or unreadable document is fatal unless
/// `init_store` seeds it first.
pub async fn open_repository(
    config: &StoreConfig,
    init_store: bool,
) -> Result<TaskRepository, StoreError> {
    let store = JsonFileStore::new(&config.path);
    if init_store && !store.seed_if_missing().await? {
        tracing::info!(path = %config.path, "Task store already exists, not seeding");
    }
    TaskRepository::load(Arc::new(store)).await
}

/// Bind the configured listener address.
pub async fn bind_listener(config: &ServiceConfig) -> Result<TcpListener, StartupError> {
    let address = config.listener.bind_address.clone();
    TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })
}
