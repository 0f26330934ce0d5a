// ABOUTME: Application state assembly and HTTP server lifecycle
// ABOUTME: Builds the shared component graph from config and serves the router until shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Server Assembly
//!
//! [`AppState`] is the shared component graph: one provider, one identity
//! resolver, one tracer, one store, built once at startup and shared by
//! every request through an `Arc`. The relay holds no per-request state
//! here; everything request-scoped lives in the handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{IdentityResolver, JwtIdentityResolver};
use crate::config::{PipelineConfig, ServerConfig};
use crate::llm::{LlmProvider, OpenAiConfig, OpenAiProvider};
use crate::routes::{ChatRoutes, HealthRoutes};
use crate::store::{ConversationStore, MemoryStore, RedisStore};
use crate::telemetry::{HttpTraceSink, NoopTraceSink, Tracer};

/// Shared application state
pub struct AppState {
    /// Completion provider
    pub provider: Arc<dyn LlmProvider>,
    /// Request identity resolver
    pub identity: Arc<dyn IdentityResolver>,
    /// Trace event emitter
    pub tracer: Tracer,
    /// Conversation store
    pub store: Arc<dyn ConversationStore>,
    /// Pipeline defaults applied to every completion
    pub pipeline: PipelineConfig,
}

impl AppState {
    /// Build the component graph from configuration
    ///
    /// # Errors
    ///
    /// Returns an error when the Redis backend is configured but
    /// unreachable.
    pub async fn from_config(config: &ServerConfig) -> Result<Self> {
        let client = reqwest::Client::new();

        let mut provider_config = OpenAiConfig::new(config.llm.api_key.clone());
        if let Some(base_url) = &config.llm.base_url {
            provider_config.base_url = base_url.clone();
        }
        provider_config.default_model = config.pipeline.model.clone();
        let provider: Arc<dyn LlmProvider> =
            Arc::new(OpenAiProvider::new(client.clone(), provider_config));

        let tracer = match &config.telemetry.ingestion_key {
            Some(key) => Tracer::new(Arc::new(HttpTraceSink::new(
                client,
                config.telemetry.endpoint.clone(),
                key.clone(),
            ))),
            None => {
                info!("No trace ingestion key configured, tracing disabled");
                Tracer::new(Arc::new(NoopTraceSink))
            }
        };

        let store: Arc<dyn ConversationStore> = match &config.store.redis {
            Some(redis_config) => Arc::new(
                RedisStore::connect(redis_config)
                    .await
                    .context("Failed to connect to the conversation store")?,
            ),
            None => {
                info!("No REDIS_URL configured, using the in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let identity: Arc<dyn IdentityResolver> =
            Arc::new(JwtIdentityResolver::new(config.auth.jwt_secret.as_bytes()));

        Ok(Self {
            provider,
            identity,
            tracer,
            store,
            pipeline: config.pipeline.clone(),
        })
    }
}

/// Build the full application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(ChatRoutes::routes(Arc::clone(&state)))
        .merge(HealthRoutes::routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Serve the application until shutdown
///
/// # Errors
///
/// Returns an error when the listener cannot bind or the server fails.
pub async fn run(state: AppState, port: u16) -> Result<()> {
    let app = router(Arc::new(state));

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    info!("Chat relay listening on port {}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install shutdown signal handler: {}", e);
    } else {
        info!("Shutdown signal received");
    }
}
