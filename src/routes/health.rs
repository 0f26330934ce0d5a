// ABOUTME: Health check endpoint reporting service and store status
// ABOUTME: Used by load balancers and deployment probes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tracing::warn;

use crate::server::AppState;

/// Health route group
pub struct HealthRoutes;

impl HealthRoutes {
    /// Build the health router
    pub fn routes(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .with_state(state)
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    let store_healthy = match state.store.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            warn!("Store health check failed: {}", e);
            false
        }
    };

    let status = if store_healthy { "ok" } else { "degraded" };
    let http_status = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(json!({
            "status": status,
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "store": if store_healthy { "healthy" } else { "unhealthy" },
        })),
    )
        .into_response()
}
