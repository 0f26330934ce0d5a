// ABOUTME: LLM completion provider abstraction with streaming support
// ABOUTME: Defines the message model, request configuration, and the provider trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Completion Provider Interface
//!
//! The contract a completion provider must satisfy to feed the relay
//! pipeline: open a streaming chat completion and yield incremental
//! [`StreamChunk`] values until the provider signals end-of-stream.
//!
//! Credentials are explicit per-request values carried on
//! [`CompletionRequest`], never process-wide mutable state, so concurrent
//! requests cannot race on each other's API keys.

mod openai;
pub mod sse_parser;

pub use openai::{OpenAiConfig, OpenAiProvider};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

use crate::errors::AppError;

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction message
    System,
    /// User input message
    User,
    /// Assistant response message
    Assistant,
}

impl MessageRole {
    /// String representation used on the provider wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a chat conversation
///
/// Immutable once appended to a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Configuration for a chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Conversation messages, in order
    pub messages: Vec<ChatMessage>,
    /// Model identifier (provider-specific, falls back to provider default)
    pub model: Option<String>,
    /// Temperature for response randomness (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Per-request API credential override
    ///
    /// When set, the provider authenticates this single call with the given
    /// key instead of its configured default. Used for caller-supplied
    /// preview tokens; only affects which account is billed.
    #[serde(skip)]
    pub api_key_override: Option<String>,
}

impl CompletionRequest {
    /// Create a new completion request with messages
    #[must_use]
    pub const fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
            api_key_override: None,
        }
    }

    /// Set the model to use
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum tokens
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Override the API credential for this single request
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key_override = Some(api_key.into());
        self
    }
}

/// A chunk of a streaming response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Content delta for this chunk
    pub delta: String,
    /// Whether this is the final chunk
    pub is_final: bool,
    /// Finish reason if final (stop, length, etc.)
    pub finish_reason: Option<String>,
}

/// Stream type for chat completion responses
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, AppError>> + Send>>;

/// Completion provider trait
///
/// Implementations open a streaming completion against their backend and
/// fail with a provider-mapped [`AppError`] before the first chunk is
/// available. The returned stream owns the network connection; dropping it
/// releases the provider handle.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Unique provider identifier (e.g. "openai")
    fn name(&self) -> &'static str;

    /// Default model used when the request does not specify one
    fn default_model(&self) -> &str;

    /// Open a streaming chat completion
    ///
    /// # Errors
    ///
    /// Returns a provider-mapped error when the request is rejected or the
    /// backend is unreachable.
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<ChatStream, AppError>;

    /// Check that the provider is reachable and the default credential valid
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be reached at all.
    async fn health_check(&self) -> Result<bool, AppError>;
}
