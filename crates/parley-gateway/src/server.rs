// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the internal ingress.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
};
use parley_config::model::GatewayConfig;
use parley_core::ParleyError;
use parley_ingest::{LocalIngress, MessageStore};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_IN_FLIGHT: usize = 128;

/// Health state for the unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl HealthState {
    pub fn new(prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>) -> Self {
        Self {
            start_time: Instant::now(),
            prometheus_render,
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub ingress: Arc<LocalIngress>,
    pub store: MessageStore,
    pub health: HealthState,
}

impl FromRef<GatewayState> for HealthState {
    fn from_ref(state: &GatewayState) -> Self {
        state.health.clone()
    }
}

/// Builds the gateway router.
///
/// - POST /internal/messages
/// - POST /internal/conversations/{id}/read
/// - GET /health
/// - GET /metrics
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/internal/messages", post(handlers::post_messages))
        .route(
            "/internal/conversations/{id}/read",
            post(handlers::post_mark_read),
        )
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(ConcurrencyLimitLayer::new(MAX_IN_FLIGHT))
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
                .layer(CorsLayer::permissive()),
        )
}

/// Binds the configured address.
pub async fn bind(config: &GatewayConfig) -> Result<TcpListener, ParleyError> {
    let addr = format!("{}:{}", config.host, config.port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| ParleyError::Config(format!("failed to bind gateway to {addr}: {e}")))
}

/// Serves the gateway on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), ParleyError> {
    let addr: Option<SocketAddr> = listener.local_addr().ok();
    tracing::info!(addr = ?addr, "gateway server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| ParleyError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway server stopped");
    Ok(())
}
