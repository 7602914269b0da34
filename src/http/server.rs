//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum Router with the fixed route table
//! - Wire up middleware (CORS, deadline, metrics, tracing, request ID)
//! - Bind server to listener
//! - Apply hot-reloaded configuration
//! - Stop accepting on shutdown and drain in-flight requests

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    middleware,
    routing::{get, MethodRouter},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::http::cors::{cors_middleware, CorsPolicy};
use crate::http::relay::{relay_handler, Relay};
use crate::http::request::{
    propagate_request_id_layer, request_span, set_request_id_layer, timeout_middleware,
    track_requests,
};
use crate::http::tasks::{create_task, delete_task, get_task, list_tasks, not_found, update_task};
use crate::store::TaskRepository;

/// Errors raised while assembling or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to build relay client: {0}")]
    RelayClient(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub tasks: TaskRepository,
    pub relay: Arc<ArcSwap<Relay>>,
    pub cors: Arc<ArcSwap<CorsPolicy>>,
    pub max_body_size: usize,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(config: &ServiceConfig, tasks: TaskRepository) -> Result<Self, ServerError> {
        Ok(Self {
            tasks,
            relay: Arc::new(ArcSwap::from_pointee(Relay::from_config(&config.relay)?)),
            cors: Arc::new(ArcSwap::from_pointee(CorsPolicy::from_config(&config.cors))),
            max_body_size: config.security.max_body_size,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        })
    }

    /// Swap in the reloadable parts of `config`.
    pub fn apply_config(&self, config: &ServiceConfig) -> Result<(), ServerError> {
        let relay = Relay::from_config(&config.relay)?;
        self.relay.store(Arc::new(relay));
        self.cors.store(Arc::new(CorsPolicy::from_config(&config.cors)));
        tracing::info!(
            allowed_origins = config.cors.allowed_origins.len(),
            relay_allowed_hosts = config.relay.allowed_hosts.len(),
            relay_timeout_secs = config.relay.timeout_secs,
            "Applied reloaded configuration"
        );
        Ok(())
    }
}

/// HTTP server for the task service.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a new HTTP server over an already loaded repository.
    pub fn new(config: ServiceConfig, tasks: TaskRepository) -> Result<Self, ServerError> {
        let state = AppState::new(&config, tasks)?;
        let router = build_router(state.clone());
        Ok(Self {
            router,
            state,
            config,
        })
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServiceConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            store_path = %self.config.store.path,
            "HTTP server starting"
        );

        let state = self.state.clone();
        let reloader = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                if let Err(e) = state.apply_config(&new_config) {
                    tracing::error!(error = %e, "Rejected reloaded configuration");
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Shared state, e.g. for inspecting the repository.
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    // `get` also answers HEAD unless HEAD is routed explicitly.
    let relay: MethodRouter<AppState> = get(relay_handler)
        .head(not_found)
        .post(relay_handler)
        .put(relay_handler)
        .delete(relay_handler)
        .fallback(not_found);

    Router::new()
        .route(
            "/api/tasks",
            get(list_tasks)
                .head(not_found)
                .post(create_task)
                .fallback(not_found),
        )
        .route(
            "/api/tasks/{id}",
            get(get_task)
                .head(not_found)
                .put(update_task)
                .delete(delete_task)
                .fallback(not_found),
        )
        .route("/bypass-cors", relay)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), timeout_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), cors_middleware))
        .layer(middleware::from_fn(track_requests))
        .with_state(state)
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(set_request_id_layer())
}
