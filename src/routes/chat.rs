// ABOUTME: Chat completion endpoint streaming provider tokens to the caller
// ABOUTME: Wires identity, the relay pipeline, trace emission, and conversation persistence
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Chat Route
//!
//! `POST /chat` takes a conversation transcript, opens a streaming
//! completion against the provider, and relays the response body
//! token-by-token as plain text. When the provider finishes, completion
//! side effects run exactly once: a trace event carrying the full response,
//! and persistence of the conversation under its owner.
//!
//! The side effects are attached to the relay, not the HTTP response, so a
//! caller that hangs up mid-stream still gets its conversation persisted.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm::{ChatMessage, CompletionRequest};
use crate::relay::{self, CompletionHooks};
use crate::server::AppState;
use crate::store::{ConversationRecord, ConversationStore};
use crate::telemetry::Tracer;

/// Maximum characters of the opening message used as the title
const TITLE_MAX_CHARS: usize = 100;

/// Request body of `POST /chat`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatApiRequest {
    /// Conversation id; minted server-side when absent
    #[serde(default)]
    pub id: Option<String>,
    /// Transcript so far, ending with the newest user message
    pub messages: Vec<ChatMessage>,
    /// Caller-supplied provider key for this single request
    #[serde(default)]
    pub preview_token: Option<String>,
}

/// Chat route group
pub struct ChatRoutes;

impl ChatRoutes {
    /// Build the chat router
    pub fn routes(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/chat", post(chat_handler))
            .with_state(state)
    }
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatApiRequest>,
) -> Response {
    let Some(identity) = state.identity.resolve(&headers).await else {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    };

    if request.messages.is_empty() {
        return AppError::invalid_input("At least one message is required").into_response();
    }

    let trace_id = Tracer::mint_trace_id();
    debug!(
        trace_id = %trace_id,
        user_id = %identity.user_id,
        messages = request.messages.len(),
        "Opening chat completion"
    );

    let mut provider_messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(prompt) = &state.pipeline.system_prompt {
        provider_messages.push(ChatMessage::system(prompt.clone()));
    }
    provider_messages.extend(request.messages.iter().cloned());

    let mut completion = CompletionRequest::new(provider_messages)
        .with_model(state.pipeline.model.clone())
        .with_temperature(state.pipeline.temperature);
    if let Some(token) = request.preview_token {
        completion = completion.with_api_key(token);
    }

    state.tracer.emit(
        "completion.request",
        json!({
            "model": state.pipeline.model,
            "temperature": state.pipeline.temperature,
        }),
        trace_id.clone(),
    );

    let stream = match state.provider.complete_stream(&completion).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(trace_id = %trace_id, "Failed to open completion: {}", e);
            return e.into_response();
        }
    };

    let hooks = CompletionSideEffects {
        tracer: state.tracer.clone(),
        store: Arc::clone(&state.store),
        trace_id,
        owner_id: identity.user_id,
        conversation_id: request.id,
        messages: request.messages,
        started_at: Instant::now(),
    };

    let body = Body::from_stream(relay::spawn(stream, hooks).into_byte_stream());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Completion-time side effects for one chat request
///
/// Trace failures and store failures are logged and swallowed here; by the
/// time these run the byte stream is already closed, so there is no caller
/// left to fail.
struct CompletionSideEffects {
    tracer: Tracer,
    store: Arc<dyn ConversationStore>,
    trace_id: String,
    owner_id: String,
    conversation_id: Option<String>,
    messages: Vec<ChatMessage>,
    started_at: Instant,
}

#[async_trait]
impl CompletionHooks for CompletionSideEffects {
    async fn on_start(&self) {
        self.tracer
            .emit("stream.start", json!({}), self.trace_id.clone());
    }

    async fn on_completion(&self, full_text: String) {
        let latency_ms = u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.tracer.emit(
            "stream.completion",
            json!({
                "completion": full_text,
                "latencyMs": latency_ms,
            }),
            self.trace_id.clone(),
        );

        let id = self
            .conversation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let created_at = Utc::now().timestamp_millis();

        let mut messages = self.messages.clone();
        messages.push(ChatMessage::assistant(full_text));

        let record = ConversationRecord {
            title: derive_title(&self.messages),
            path: format!("/chat/{id}"),
            user_id: self.owner_id.clone(),
            id,
            created_at,
            messages,
        };

        if let Err(e) = self.store.put_record(&record).await {
            error!(
                trace_id = %self.trace_id,
                key = %record.key(),
                "Failed to persist conversation: {}", e
            );
            // No index entry without a record; the index must never point
            // at a missing key.
            return;
        }

        if let Err(e) = self
            .store
            .add_to_index(&self.owner_id, created_at, &record.key())
            .await
        {
            error!(
                trace_id = %self.trace_id,
                key = %record.key(),
                "Conversation persisted but not indexed: {}", e
            );
            return;
        }

        info!(
            trace_id = %self.trace_id,
            key = %record.key(),
            latency_ms,
            "Conversation persisted"
        );
    }
}

/// Title is the opening message truncated on a character boundary
fn derive_title(messages: &[ChatMessage]) -> String {
    messages.first().map_or_else(String::new, |first| {
        first.content.chars().take(TITLE_MAX_CHARS).collect()
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_derive_title_short_message() {
        let messages = vec![ChatMessage::user("2+2?")];
        assert_eq!(derive_title(&messages), "2+2?");
    }

    #[test]
    fn test_derive_title_truncates_at_char_boundary() {
        let long = "é".repeat(150);
        let messages = vec![ChatMessage::user(long)];
        let title = derive_title(&messages);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS);
        assert_eq!(title, "é".repeat(TITLE_MAX_CHARS));
    }

    #[test]
    fn test_derive_title_uses_first_message() {
        let messages = vec![
            ChatMessage::user("first question"),
            ChatMessage::assistant("answer"),
            ChatMessage::user("second question"),
        ];
        assert_eq!(derive_title(&messages), "first question");
    }

    #[test]
    fn test_derive_title_empty_transcript() {
        assert_eq!(derive_title(&[]), "");
    }

    #[test]
    fn test_request_accepts_camel_case_preview_token() {
        let body = r#"{"messages":[{"role":"user","content":"hi"}],"previewToken":"sk-x"}"#;
        let request: ChatApiRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.preview_token.as_deref(), Some("sk-x"));
        assert!(request.id.is_none());
    }
}
