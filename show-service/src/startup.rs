//! Application startup and lifecycle management.
//!
//! Builds the store and queue clients once, hands them to the HTTP router and
//! the acceptance updater, and stops both through one cancellation token.

use crate::config::{RetryPolicy, ShowConfig};
use crate::handlers;
use crate::services::{ShowDb, ShowStore};
use crate::workers::{AcceptanceUpdater, AmqpSource, MessageSource};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ShowStore>,
}

/// HTTP routes: the show operations under `/show` plus probes and metrics.
pub fn router(state: AppState) -> Router {
    let show_routes = Router::new()
        .route("/add", post(handlers::add_show))
        .route("/get", get(handlers::list_shows))
        .route("/get/:id", get(handlers::get_show))
        .route("/get-accepted", get(handlers::list_accepted_shows))
        .route("/get-unaccepted", get(handlers::list_unaccepted_shows));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .nest("/show", show_routes)
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    source: Box<dyn MessageSource>,
    retry: RetryPolicy,
    shutdown: CancellationToken,
}

impl Application {
    /// Connects to MongoDB and RabbitMQ and binds the HTTP listener.
    ///
    /// Any failure here is fatal for the process.
    pub async fn build(config: ShowConfig) -> Result<Self, AppError> {
        let db = ShowDb::connect(
            &config.mongodb.uri,
            &config.mongodb.database,
            &config.mongodb.collection,
        )
        .await?;

        db.health_check().await.map_err(|e| {
            tracing::error!("MongoDB is not reachable: {}", e);
            AppError::from(e)
        })?;

        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let source = AmqpSource::connect(&config.queue).await?;

        let app = Self::build_with(config.common.port, Arc::new(db), Box::new(source)).await?;
        Ok(app.with_retry_policy(config.queue.retry))
    }

    /// Builds around an already constructed store and message source.
    pub async fn build_with(
        port: u16,
        store: Arc<dyn ShowStore>,
        source: Box<dyn MessageSource>,
    ) -> Result<Self, AppError> {
        // port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Show service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state: AppState { store },
            source,
            retry: RetryPolicy::default(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Backoff applied by the acceptance updater to store failures.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Cancelling this token stops the HTTP server and the acceptance updater.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serves HTTP and runs the acceptance updater until shutdown is requested.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let updater = AcceptanceUpdater::new(self.state.store.clone()).with_retry(self.retry);
        let updater_task = tokio::spawn(updater.run(self.source, self.shutdown.clone()));

        let app = router(self.state);
        let shutdown = self.shutdown.clone();
        let result = axum::serve(self.listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;

        if let Err(e) = &result {
            tracing::error!("HTTP server error: {}", e);
        }

        // The updater may still be running if the server stopped on its own
        self.shutdown.cancel();
        if let Err(e) = updater_task.await {
            tracing::error!("Acceptance updater task failed: {}", e);
        }

        tracing::info!("Show service stopped");
        result
    }
}
