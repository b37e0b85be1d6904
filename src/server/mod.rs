//! HTTP server module for the ingest API and WebSocket fan-out.
//!
//! Provides the producer-facing push endpoint, a latest-reading query and a
//! WebSocket for real-time updates to dashboards.

pub mod payload;
pub mod routes;
pub mod state;
pub mod ws;

use crate::config::{ServerConfig, MAX_REQUEST_BODY_BYTES};
use crate::server::routes::{health, sensor};
use crate::server::state::AppState;
use crate::server::ws::ws_handler;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Builds the router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    // CORS layer for dashboards and the greenhouse bridge
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Sensor API
        .route(
            "/api/sensor/push",
            post(sensor::push_reading).layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES)),
        )
        .route("/api/sensor/latest", get(sensor::latest_reading))
        // WebSocket
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Runs the axum server until `shutdown` resolves.
pub async fn run_server<F>(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.listen_addr();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}
