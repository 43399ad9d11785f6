// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use skillrun_core::SkillrunError;
use skillrun_engine::InvocationGateway;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub invocations: Arc<InvocationGateway>,
    /// Capacity of each live client's envelope channel.
    pub emitter_buffer: usize,
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Prometheus text renderer for /metrics, when metrics are enabled.
    pub metrics_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl GatewayState {
    pub fn new(invocations: Arc<InvocationGateway>, emitter_buffer: usize) -> Self {
        Self {
            invocations,
            emitter_buffer,
            start_time: std::time::Instant::now(),
            metrics_render: None,
        }
    }

    pub fn with_metrics(mut self, render: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        self.metrics_render = Some(render);
        self
    }
}

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Routes:
/// - GET /health
/// - GET /metrics
/// - POST /v1/invoke
/// - GET /v1/results/{result_id}
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .route("/v1/invoke", post(handlers::post_invoke))
        .route("/v1/results/{result_id}", get(handlers::get_result))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds to the configured host:port and serves until `shutdown` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), SkillrunError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SkillrunError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| SkillrunError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
