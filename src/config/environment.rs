// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses environment variables into the typed server configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Environment-based configuration for production deployment.
//!
//! All settings come from environment variables; required values fail fast
//! at startup with a named variable in the error.

use anyhow::{Context, Result};
use std::env;

use crate::store::RedisStoreConfig;

/// Default HTTP port
const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default trace ingestion endpoint
const DEFAULT_TRACE_ENDPOINT: &str = "https://event.autoblocks.ai";

/// Default completion model
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Default sampling temperature
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Completion provider settings
#[derive(Debug, Clone)]
pub struct LlmEnvConfig {
    /// Default API key (`OPENAI_API_KEY`)
    pub api_key: String,
    /// API base URL override (`OPENAI_BASE_URL`)
    pub base_url: Option<String>,
}

/// Trace ingestion settings
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Ingestion key (`TRACE_INGESTION_KEY`); tracing is disabled when unset
    pub ingestion_key: Option<String>,
    /// Ingestion endpoint (`TRACE_INGESTION_URL`)
    pub endpoint: String,
}

/// Conversation store settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis backend (`REDIS_URL`); the in-memory store is used when unset
    pub redis: Option<RedisStoreConfig>,
}

/// Authentication settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for session JWTs (`JWT_SECRET`)
    pub jwt_secret: String,
}

/// Completion pipeline defaults applied to every request
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model identifier (`CHAT_MODEL`)
    pub model: String,
    /// Sampling temperature (`CHAT_TEMPERATURE`)
    pub temperature: f32,
    /// System prompt prepended to every conversation (`CHAT_SYSTEM_PROMPT`)
    pub system_prompt: Option<String>,
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port (`HTTP_PORT`)
    pub http_port: u16,
    /// Completion provider settings
    pub llm: LlmEnvConfig,
    /// Trace ingestion settings
    pub telemetry: TelemetryConfig,
    /// Conversation store settings
    pub store: StoreConfig,
    /// Authentication settings
    pub auth: AuthConfig,
    /// Pipeline defaults
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error when a required variable is missing or a numeric
    /// variable fails to parse.
    pub fn from_env() -> Result<Self> {
        let http_port = match env::var("HTTP_PORT") {
            Ok(port) => port
                .parse::<u16>()
                .with_context(|| format!("Invalid HTTP_PORT value: {port}"))?,
            Err(_) => DEFAULT_HTTP_PORT,
        };

        let llm = LlmEnvConfig {
            api_key: env::var("OPENAI_API_KEY")
                .context("OPENAI_API_KEY environment variable is required")?,
            base_url: env::var("OPENAI_BASE_URL").ok(),
        };

        let telemetry = TelemetryConfig {
            ingestion_key: env::var("TRACE_INGESTION_KEY").ok(),
            endpoint: env_var_or("TRACE_INGESTION_URL", DEFAULT_TRACE_ENDPOINT),
        };

        let store = StoreConfig {
            redis: env::var("REDIS_URL").ok().map(RedisStoreConfig::new),
        };

        let auth = AuthConfig {
            jwt_secret: env::var("JWT_SECRET")
                .context("JWT_SECRET environment variable is required")?,
        };

        let temperature = match env::var("CHAT_TEMPERATURE") {
            Ok(t) => t
                .parse::<f32>()
                .with_context(|| format!("Invalid CHAT_TEMPERATURE value: {t}"))?,
            Err(_) => DEFAULT_TEMPERATURE,
        };

        let pipeline = PipelineConfig {
            model: env_var_or("CHAT_MODEL", DEFAULT_MODEL),
            temperature,
            system_prompt: env::var("CHAT_SYSTEM_PROMPT").ok(),
        };

        Ok(Self {
            http_port,
            llm,
            telemetry,
            store,
            auth,
            pipeline,
        })
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}
