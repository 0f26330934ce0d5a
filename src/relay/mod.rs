// ABOUTME: Stream relay turning provider chunk streams into HTTP byte streams
// ABOUTME: Guarantees exactly-once start/completion hooks that survive client disconnects
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Stream Relay
//!
//! The relay consumes a provider [`ChatStream`] on a detached task, forwards
//! each delta to the HTTP caller through a bounded channel, and accumulates
//! the full text for completion-time side effects.
//!
//! Ordering and delivery guarantees, per session:
//!
//! - [`CompletionHooks::on_start`] fires exactly once, before the first
//!   forwarded byte.
//! - [`CompletionHooks::on_completion`] fires exactly once, strictly after
//!   the last forwarded byte, and only when the provider signalled a
//!   successful end-of-stream.
//! - A provider error mid-flight terminates the byte stream with an error
//!   item and skips `on_completion`; bytes already forwarded stay sent.
//! - A caller disconnect stops forwarding but the relay keeps draining the
//!   provider stream, so completion side effects are keyed to provider
//!   completion, not caller presence.
//!
//! The relay holds no buffered history beyond the single full-text
//! accumulator; forwarding is increment-at-a-time over a bounded channel.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::llm::ChatStream;

/// Bounded forwarding channel depth; the transport provides backpressure
const RELAY_CHANNEL_CAPACITY: usize = 32;

/// Side effects bound to the relay lifecycle
///
/// Implementations must not fail outward: the relay ignores nothing and
/// retries nothing, it simply awaits each hook once at the right point in
/// the stream.
#[async_trait]
pub trait CompletionHooks: Send + Sync + 'static {
    /// Invoked exactly once, before the first byte is forwarded
    async fn on_start(&self);

    /// Invoked exactly once after a successful end-of-stream, with the
    /// complete concatenated text
    async fn on_completion(&self, full_text: String);
}

/// Per-request relay session state
///
/// Created when the provider stream opens, mutated only by the relay task,
/// and dropped once the completion side effects finish or the pipeline
/// aborts.
#[derive(Debug, Default)]
struct StreamSession {
    /// Accumulated response text, grows monotonically
    text: String,
    /// Whether `on_start` has fired
    started: bool,
    /// Whether the caller stopped reading; draining continues regardless
    caller_gone: bool,
}

/// Handle to a running relay
///
/// The byte stream half feeds the HTTP response body; the join handle half
/// resolves once the drain task (including completion side effects) is done,
/// which tests and graceful shutdown can await.
pub struct RelayHandle {
    receiver: mpsc::Receiver<Result<Bytes, AppError>>,
    task: JoinHandle<()>,
}

impl RelayHandle {
    /// Split into the outbound byte stream and the drain task handle
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        ReceiverStream<Result<Bytes, AppError>>,
        JoinHandle<()>,
    ) {
        (ReceiverStream::new(self.receiver), self.task)
    }

    /// Take just the outbound byte stream, leaving the drain task detached
    #[must_use]
    pub fn into_byte_stream(self) -> ReceiverStream<Result<Bytes, AppError>> {
        ReceiverStream::new(self.receiver)
    }
}

/// Spawn a relay draining `chat_stream` with the given lifecycle hooks
pub fn spawn<H: CompletionHooks>(mut chat_stream: ChatStream, hooks: H) -> RelayHandle {
    let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);

    let task = tokio::spawn(async move {
        let mut session = StreamSession::default();

        while let Some(item) = chat_stream.next().await {
            match item {
                Ok(chunk) => {
                    if !session.started {
                        session.started = true;
                        hooks.on_start().await;
                    }
                    if chunk.delta.is_empty() {
                        continue;
                    }
                    session.text.push_str(&chunk.delta);
                    if !session.caller_gone
                        && tx.send(Ok(Bytes::from(chunk.delta))).await.is_err()
                    {
                        // Caller disconnected; keep draining so completion
                        // side effects still run.
                        session.caller_gone = true;
                        debug!("Caller disconnected, draining provider stream");
                    }
                }
                Err(e) => {
                    warn!("Provider stream failed mid-flight: {}", e);
                    if !session.caller_gone {
                        let _ = tx.send(Err(e)).await;
                    }
                    // Aborted: no completion side effects.
                    return;
                }
            }
        }

        // Close the byte stream before running side effects so the caller's
        // response completes without waiting on tracing or persistence.
        drop(tx);
        hooks.on_completion(session.text).await;
    });

    RelayHandle { receiver: rx, task }
}
