// ABOUTME: In-memory conversation store for development and tests
// ABOUTME: Mirrors the redis backend's record and index semantics with plain maps
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ConversationRecord, ConversationStore};
use crate::errors::{AppError, AppResult};

/// In-memory conversation store
///
/// Single-process only; used by tests and local development runs where no
/// Redis is available. Semantics match the redis backend: full-record
/// replacement, and an index entry upsert keyed by record key.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, ConversationRecord>>,
    indexes: Mutex<HashMap<String, Vec<(i64, String)>>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored record by its record key
    #[must_use]
    pub fn get_record(&self, record_key: &str) -> Option<ConversationRecord> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(record_key)
            .cloned()
    }

    /// Members of an owner's recency index, ascending by score
    #[must_use]
    pub fn index_members(&self, owner_id: &str) -> Vec<(i64, String)> {
        let mut members = self
            .indexes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&super::index_key(owner_id))
            .cloned()
            .unwrap_or_default();
        members.sort();
        members
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn put_record(&self, record: &ConversationRecord) -> AppResult<()> {
        // Surface the same serialization failures the redis path would hit.
        record.to_fields()?;

        self.records
            .lock()
            .map_err(|_| AppError::storage("Record map lock poisoned"))?
            .insert(record.key(), record.clone());
        Ok(())
    }

    async fn add_to_index(&self, owner_id: &str, score: i64, record_key: &str) -> AppResult<()> {
        let mut indexes = self
            .indexes
            .lock()
            .map_err(|_| AppError::storage("Index map lock poisoned"))?;

        let members = indexes.entry(super::index_key(owner_id)).or_default();
        // ZADD semantics: re-adding an existing member updates its score.
        members.retain(|(_, key)| key != record_key);
        members.push((score, record_key.to_owned()));
        Ok(())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
