// ABOUTME: Library root for the chat-relay streaming chat backend
// ABOUTME: Exposes the relay pipeline, LLM client, persistence, and telemetry modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Chat Relay
//!
//! A streaming chat backend that forwards user messages to an LLM completion
//! API, relays the response back to the caller token-by-token, persists the
//! finished conversation to a key-value store, and emits trace events to an
//! observability endpoint.
//!
//! ## Architecture
//!
//! - [`llm`] - completion provider abstraction with SSE streaming support
//! - [`relay`] - the stream relay: provider chunks in, HTTP bytes out, with
//!   exactly-once start/completion hooks that survive client disconnects
//! - [`store`] - conversation persistence (Redis hash + sorted-set index)
//! - [`telemetry`] - fire-and-forget trace event emission
//! - [`routes`] - axum HTTP handlers binding the pipeline together
//!
//! ## Example
//!
//! ```rust,no_run
//! use chat_relay::config::environment::ServerConfig;
//! use chat_relay::server::AppState;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let state = AppState::from_config(&config).await?;
//!     chat_relay::server::run(state, config.http_port).await
//! }
//! ```

/// Identity resolution seam for inbound requests
pub mod auth;
/// Environment-driven configuration
pub mod config;
/// Unified error handling with HTTP response mapping
pub mod errors;
/// LLM completion provider abstraction and OpenAI-compatible client
pub mod llm;
/// Logging configuration and structured logging setup
pub mod logging;
/// Stream relay with exactly-once completion side effects
pub mod relay;
/// HTTP route handlers
pub mod routes;
/// Router assembly and serve loop
pub mod server;
/// Conversation persistence backends
pub mod store;
/// Fire-and-forget trace event emission
pub mod telemetry;
