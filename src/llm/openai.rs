// ABOUTME: OpenAI-compatible completion client with SSE streaming
// ABOUTME: Opens streaming chat completions and maps provider failures onto the error taxonomy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # OpenAI-Compatible Provider
//!
//! Streaming chat completion client for the OpenAI `chat/completions` API
//! and any endpoint speaking the same dialect. The base URL is configurable
//! so self-hosted gateways work unchanged.
//!
//! Credential resolution: the configured default key, overridden per request
//! by [`CompletionRequest::api_key_override`] when a caller supplies a
//! preview token.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use super::sse_parser::create_sse_stream;
use super::{ChatMessage, ChatStream, CompletionRequest, LlmProvider, StreamChunk};
use crate::errors::AppError;

/// Provider name used in error messages and traces
const PROVIDER_NAME: &str = "openai";

/// Default API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model when neither request nor config specify one
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for ApiMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }
    }
}

/// Streaming chunk payload
#[derive(Debug, Deserialize)]
struct ApiStreamChunk {
    choices: Vec<ApiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiStreamChoice {
    delta: ApiDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

// ============================================================================
// Provider
// ============================================================================

/// Configuration for the OpenAI-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API base URL (e.g. `https://api.openai.com/v1`)
    pub base_url: String,
    /// Default API key used when a request carries no override
    pub api_key: String,
    /// Default model
    pub default_model: String,
}

impl OpenAiConfig {
    /// Create a config with the stock OpenAI endpoint and model
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: api_key.into(),
            default_model: DEFAULT_MODEL.to_owned(),
        }
    }
}

/// OpenAI-compatible completion provider
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    /// Create a provider sharing an existing HTTP client
    #[must_use]
    pub const fn new(client: Client, config: OpenAiConfig) -> Self {
        Self { client, config }
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.config.base_url.trim_end_matches('/'))
    }

    /// Resolve the credential for one request
    fn resolve_key<'a>(&'a self, request: &'a CompletionRequest) -> &'a str {
        request
            .api_key_override
            .as_deref()
            .unwrap_or(&self.config.api_key)
    }

    /// Map a non-success provider status onto the error taxonomy
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> AppError {
        let detail = serde_json::from_str::<ApiErrorResponse>(body).map(|r| r.error);
        let message = detail.as_ref().map_or_else(
            |_| body.chars().take(200).collect::<String>(),
            |d| d.message.clone(),
        );

        match status.as_u16() {
            401 | 403 => AppError::external_auth(PROVIDER_NAME, message),
            429 => AppError::external_rate_limited(PROVIDER_NAME, message),
            400 => AppError::invalid_input(format!("Provider rejected request: {message}")),
            _ => {
                let error_type = detail
                    .ok()
                    .and_then(|d| d.error_type)
                    .unwrap_or_else(|| "unknown".to_owned());
                AppError::external_service(PROVIDER_NAME, format!("{error_type} - {message}"))
            }
        }
    }

    /// Parse one SSE `data:` payload into a stream chunk
    fn parse_stream_payload(json_str: &str) -> Option<Result<StreamChunk, AppError>> {
        match serde_json::from_str::<ApiStreamChunk>(json_str) {
            Ok(chunk) => {
                let choice = chunk.choices.into_iter().next()?;
                Some(Ok(StreamChunk {
                    delta: choice.delta.content.unwrap_or_default(),
                    is_final: choice.finish_reason.is_some(),
                    finish_reason: choice.finish_reason,
                }))
            }
            Err(e) => {
                warn!("Failed to parse provider stream chunk: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.config.default_model)))]
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<ChatStream, AppError> {
        let model = request
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model);

        debug!("Opening streaming chat completion");

        let api_request = ApiRequest {
            model: model.to_owned(),
            messages: request.messages.iter().map(ApiMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
        };

        let response = self
            .client
            .post(self.api_url("chat/completions"))
            .bearer_auth(self.resolve_key(request))
            .json(&api_request)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach completion API: {}", e);
                AppError::external_service(PROVIDER_NAME, format!("Failed to connect: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, &body));
        }

        Ok(create_sse_stream(
            response.bytes_stream(),
            Self::parse_stream_payload,
            PROVIDER_NAME,
        ))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<bool, AppError> {
        let response = self
            .client
            .get(self.api_url("models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| {
                AppError::external_service(PROVIDER_NAME, format!("Health check failed: {e}"))
            })?;

        let healthy = response.status().is_success();
        if !healthy {
            warn!(
                "Completion API health check failed with status: {}",
                response.status()
            );
        }
        Ok(healthy)
    }
}
