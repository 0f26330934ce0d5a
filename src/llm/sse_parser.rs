// ABOUTME: Line-buffering SSE parser for LLM streaming responses
// ABOUTME: Handles partial lines across TCP boundaries and multiple events per chunk
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # SSE Stream Parser
//!
//! Server-Sent Events framing for provider byte streams. TCP does not align
//! network chunks with SSE event boundaries, so a correct consumer must
//! handle two cases:
//!
//! 1. several `data:` events batched into one chunk - all must be emitted;
//! 2. a JSON payload split across two chunks - the partial line must be
//!    buffered until its terminating newline arrives.
//!
//! Providers supply a `parse_data` closure that turns a raw JSON payload
//! into a [`StreamChunk`]; the framing (`data:` prefix stripping, `[DONE]`
//! detection, line buffering) lives here once.

use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::unfold;
use futures_util::{future, Stream, StreamExt};

use super::{ChatStream, StreamChunk};
use crate::errors::AppError;

/// A parsed SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload with the prefix stripped
    Data(String),
    /// The `data: [DONE]` termination signal (OpenAI convention)
    Done,
}

/// Line buffer that extracts complete SSE events from raw byte chunks
///
/// Incomplete trailing lines stay buffered until the next `feed` call.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: String,
}

impl SseLineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every complete SSE event they unlock
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos].trim_end_matches('\r').to_owned();
            self.buffer.drain(..=newline_pos);

            if let Some(event) = Self::parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing partial line when the byte stream ends
    pub fn flush(&mut self) -> Option<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        Self::parse_line(&remaining)
    }

    /// Parse one line; empty lines and non-`data:` fields yield nothing
    fn parse_line(line: &str) -> Option<SseEvent> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed == "data: [DONE]" {
            return Some(SseEvent::Done);
        }
        // Ignore other SSE fields (event:, id:, retry:, ":" comments)
        let data = trimmed.strip_prefix("data: ")?;
        if data.trim().is_empty() {
            None
        } else {
            Some(SseEvent::Data(data.to_owned()))
        }
    }
}

/// Internal state threaded through the unfold
struct SseStreamState<F> {
    parser: SseLineBuffer,
    pending: VecDeque<Result<StreamChunk, AppError>>,
    stream_ended: bool,
    parse_data: F,
    provider_name: &'static str,
}

impl<F> SseStreamState<F>
where
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>>,
{
    /// Convert parsed SSE events into pending stream chunks
    fn enqueue(&mut self, events: impl IntoIterator<Item = SseEvent>) {
        for event in events {
            match event {
                SseEvent::Data(json_str) => {
                    if let Some(result) = (self.parse_data)(&json_str) {
                        self.pending.push_back(result);
                    }
                }
                SseEvent::Done => {
                    self.pending.push_back(Ok(StreamChunk {
                        delta: String::new(),
                        is_final: true,
                        finish_reason: Some("stop".to_owned()),
                    }));
                }
            }
        }
    }
}

/// Wrap a raw provider byte stream into a buffered chunk stream
///
/// `parse_data` converts a provider-specific JSON payload into a chunk, or
/// `None` for events that produce no output (metadata-only frames). Empty
/// deltas are filtered out unless final.
pub fn create_sse_stream<S, F>(
    byte_stream: S,
    parse_data: F,
    provider_name: &'static str,
) -> ChatStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>> + Send + 'static,
{
    let state = SseStreamState {
        parser: SseLineBuffer::new(),
        pending: VecDeque::new(),
        stream_ended: false,
        parse_data,
        provider_name,
    };

    let byte_stream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>> =
        Box::pin(byte_stream);

    // unfold keeps the parser state alive across async iterations; each turn
    // drains a pending event or reads the next TCP chunk.
    let stream = unfold(
        (byte_stream, state),
        |(mut byte_stream, mut state)| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, (byte_stream, state)));
                }
                if state.stream_ended {
                    return None;
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        let events = state.parser.feed(&bytes);
                        state.enqueue(events);
                    }
                    Some(Err(e)) => {
                        state.stream_ended = true;
                        let err = AppError::external_service(
                            state.provider_name,
                            format!("Stream read error: {e}"),
                        );
                        return Some((Err(err), (byte_stream, state)));
                    }
                    None => {
                        state.stream_ended = true;
                        let events = state.parser.flush();
                        state.enqueue(events);
                    }
                }
            }
        },
    );

    let filtered = stream.filter(|result| {
        future::ready(match result {
            Ok(chunk) => !chunk.delta.is_empty() || chunk.is_final,
            Err(_) => true,
        })
    });

    Box::pin(filtered)
}
