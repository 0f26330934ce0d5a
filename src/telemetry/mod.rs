// ABOUTME: Fire-and-forget trace event emission for the streaming pipeline
// ABOUTME: Delivers lifecycle events to an ingestion endpoint without blocking the byte stream
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Trace Telemetry
//!
//! Lifecycle events (`stream.start`, `stream.completion`) correlated by a
//! per-request trace id. Emission is fire-and-forget: every send runs on a
//! detached task with a bounded timeout, and failures are logged and
//! swallowed so tracing can never stall or fail a chat response.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Upper bound on a single trace delivery, including connect time
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// A single trace event on the ingestion wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Event name, e.g. `stream.start`
    pub message: String,
    /// Arbitrary structured payload
    pub properties: serde_json::Value,
    /// Correlates all events of one request
    #[serde(rename = "traceId")]
    pub trace_id: String,
}

/// Destination for trace events
#[async_trait]
pub trait TraceSink: Send + Sync + 'static {
    /// Deliver one event
    ///
    /// # Errors
    ///
    /// Returns an error when the event could not be delivered; the
    /// [`Tracer`] logs and swallows it.
    async fn send(&self, event: TraceEvent) -> AppResult<()>;
}

/// HTTP sink posting events to an ingestion endpoint with a bearer key
pub struct HttpTraceSink {
    client: Client,
    endpoint: String,
    ingestion_key: String,
}

impl HttpTraceSink {
    /// Create a sink sharing an existing HTTP client
    #[must_use]
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        ingestion_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            ingestion_key: ingestion_key.into(),
        }
    }
}

#[async_trait]
impl TraceSink for HttpTraceSink {
    async fn send(&self, event: TraceEvent) -> AppResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.ingestion_key)
            .json(&event)
            .send()
            .await
            .map_err(|e| {
                AppError::external_service("trace-ingestion", format!("Failed to connect: {e}"))
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AppError::external_service(
                "trace-ingestion",
                format!("Ingestion endpoint returned {status}"),
            ))
        }
    }
}

/// Sink used when no ingestion key is configured; discards every event
pub struct NoopTraceSink;

#[async_trait]
impl TraceSink for NoopTraceSink {
    async fn send(&self, _event: TraceEvent) -> AppResult<()> {
        Ok(())
    }
}

/// Trace emitter shared across request handlers
///
/// Cloning is cheap; all clones share the underlying sink.
#[derive(Clone)]
pub struct Tracer {
    sink: Arc<dyn TraceSink>,
    timeout: Duration,
}

impl Tracer {
    /// Create a tracer over the given sink
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self {
            sink,
            timeout: SEND_TIMEOUT,
        }
    }

    /// Mint a fresh trace id for one request
    #[must_use]
    pub fn mint_trace_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Emit an event on a detached task
    ///
    /// Returns immediately; delivery failure and timeout are logged at warn
    /// and otherwise invisible to the caller.
    pub fn emit(
        &self,
        message: impl Into<String>,
        properties: serde_json::Value,
        trace_id: impl Into<String>,
    ) {
        let event = TraceEvent {
            message: message.into(),
            properties,
            trace_id: trace_id.into(),
        };
        let sink = Arc::clone(&self.sink);
        let timeout = self.timeout;

        tokio::spawn(async move {
            let name = event.message.clone();
            match tokio::time::timeout(timeout, sink.send(event)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Trace event '{}' not delivered: {}", name, e),
                Err(_) => warn!("Trace event '{}' timed out after {:?}", name, timeout),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    struct RecordingSink {
        events: Mutex<Vec<TraceEvent>>,
        notify: Notify,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                notify: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl TraceSink for Arc<RecordingSink> {
        async fn send(&self, event: TraceEvent) -> AppResult<()> {
            self.events.lock().unwrap().push(event);
            self.notify.notify_one();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_emit_delivers_event() {
        let sink = Arc::new(RecordingSink::new());
        let tracer = Tracer::new(Arc::new(Arc::clone(&sink)));

        let trace_id = Tracer::mint_trace_id();
        tracer.emit(
            "stream.start",
            serde_json::json!({}),
            trace_id.clone(),
        );

        sink.notify.notified().await;
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "stream.start");
        assert_eq!(events[0].trace_id, trace_id);
    }

    #[tokio::test]
    async fn test_emit_survives_sink_failure() {
        struct FailingSink;

        #[async_trait]
        impl TraceSink for FailingSink {
            async fn send(&self, _event: TraceEvent) -> AppResult<()> {
                Err(AppError::external_service("trace-ingestion", "down"))
            }
        }

        let tracer = Tracer::new(Arc::new(FailingSink));
        // Must not panic or propagate the failure.
        tracer.emit("stream.completion", serde_json::json!({}), "t-1");
        tokio::task::yield_now().await;
    }

    #[test]
    fn test_trace_event_wire_format() {
        let event = TraceEvent {
            message: "stream.completion".to_owned(),
            properties: serde_json::json!({"completion": "4"}),
            trace_id: "abc".to_owned(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["traceId"], "abc");
        assert_eq!(json["message"], "stream.completion");
        assert_eq!(json["properties"]["completion"], "4");
    }

    #[test]
    fn test_minted_trace_ids_are_unique() {
        assert_ne!(Tracer::mint_trace_id(), Tracer::mint_trace_id());
    }
}
