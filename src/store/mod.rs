// ABOUTME: Conversation persistence abstraction over hash records and a per-owner index
// ABOUTME: Defines the record shape, key scheme, and the store trait implemented by redis and memory backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Conversation Store
//!
//! Persists completed conversations as two coupled structures:
//!
//! - a record at `chat:{id}` holding the conversation fields, with the
//!   transcript serialized as a JSON array;
//! - a per-owner index at `user:chat:{owner_id}`, a sorted set of record
//!   keys scored by creation time in epoch milliseconds, so recency queries
//!   are a range scan.
//!
//! Writes are last-writer-wins on the full record. The record write and the
//! index write are not atomic; callers insert into the index only after the
//! record write succeeds, so the index never points at a missing record.

pub mod memory;
pub mod redis;

pub use memory::MemoryStore;
pub use redis::{RedisStore, RedisStoreConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::llm::ChatMessage;

/// Key of the record hash for a conversation id
#[must_use]
pub fn record_key(conversation_id: &str) -> String {
    format!("chat:{conversation_id}")
}

/// Key of the recency index for an owner
#[must_use]
pub fn index_key(owner_id: &str) -> String {
    format!("user:chat:{owner_id}")
}

/// A persisted conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    /// Conversation identifier
    pub id: String,
    /// Display title derived from the first message
    pub title: String,
    /// Owning user
    pub user_id: String,
    /// Creation time, epoch milliseconds
    pub created_at: i64,
    /// UI path of the conversation
    pub path: String,
    /// Full transcript including the assistant response
    pub messages: Vec<ChatMessage>,
}

impl ConversationRecord {
    /// Key this record is stored under
    #[must_use]
    pub fn key(&self) -> String {
        record_key(&self.id)
    }

    /// Flatten into the field/value pairs of the stored hash
    ///
    /// The transcript becomes a JSON array under the `messages` field.
    ///
    /// # Errors
    ///
    /// Returns a serialization error when the transcript cannot be encoded.
    pub fn to_fields(&self) -> AppResult<Vec<(String, String)>> {
        let messages = serde_json::to_string(&self.messages).map_err(|e| {
            AppError::serialization(format!("Failed to serialize transcript: {e}"))
        })?;
        Ok(vec![
            ("id".to_owned(), self.id.clone()),
            ("title".to_owned(), self.title.clone()),
            ("userId".to_owned(), self.user_id.clone()),
            ("createdAt".to_owned(), self.created_at.to_string()),
            ("path".to_owned(), self.path.clone()),
            ("messages".to_owned(), messages),
        ])
    }
}

/// Conversation persistence backend
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Write the full record, replacing any previous version
    ///
    /// # Errors
    ///
    /// Returns a storage error when the write fails.
    async fn put_record(&self, record: &ConversationRecord) -> AppResult<()>;

    /// Insert a record key into an owner's recency index
    ///
    /// # Errors
    ///
    /// Returns a storage error when the index write fails.
    async fn add_to_index(&self, owner_id: &str, score: i64, record_key: &str) -> AppResult<()>;

    /// Check backend connectivity
    ///
    /// # Errors
    ///
    /// Returns a storage error when the backend cannot be queried.
    async fn health_check(&self) -> AppResult<bool>;
}
