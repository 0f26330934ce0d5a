// ABOUTME: Redis conversation store with managed connections and retry on startup
// ABOUTME: Writes record hashes via HSET and maintains the per-owner recency sorted set via ZADD
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use tracing::{error, info, warn};

use super::{ConversationRecord, ConversationStore};
use crate::errors::{AppError, AppResult};

/// Connection settings for the Redis backend
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection URL
    pub url: String,
    /// Timeout for establishing a connection, seconds
    pub connection_timeout_secs: u64,
    /// Timeout for a single command response, seconds
    pub response_timeout_secs: u64,
    /// Retries of the initial connection before giving up
    pub initial_connection_retries: usize,
    /// Delay before the first initial-connection retry, milliseconds
    pub initial_retry_delay_ms: u64,
    /// Cap on the backoff delay, milliseconds
    pub max_retry_delay_ms: u64,
}

impl RedisStoreConfig {
    /// Defaults for everything except the URL
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection_timeout_secs: 5,
            response_timeout_secs: 5,
            initial_connection_retries: 3,
            initial_retry_delay_ms: 100,
            max_retry_delay_ms: 2_000,
        }
    }
}

/// Redis-backed conversation store
///
/// Uses `ConnectionManager` for automatic reconnection; clones share the
/// underlying multiplexed connection.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis, retrying the initial connection with backoff
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or every connection attempt
    /// fails.
    pub async fn connect(config: &RedisStoreConfig) -> AppResult<Self> {
        info!(
            "Connecting to Redis at {} (timeout={}s, retries={})",
            config.url, config.connection_timeout_secs, config.initial_connection_retries
        );

        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| AppError::config(format!("Invalid Redis URL: {e}")))?;

        let manager = Self::connect_with_retry(&client, config).await?;
        info!("Successfully connected to Redis");
        Ok(Self { manager })
    }

    async fn connect_with_retry(
        client: &redis::Client,
        config: &RedisStoreConfig,
    ) -> AppResult<ConnectionManager> {
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .set_response_timeout(Duration::from_secs(config.response_timeout_secs))
            .set_max_delay(config.max_retry_delay_ms);

        let mut last_error = None;
        let mut delay_ms = config.initial_retry_delay_ms;

        for attempt in 0..=config.initial_connection_retries {
            match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await {
                Ok(manager) => {
                    if attempt > 0 {
                        info!("Redis connection established after {} retries", attempt);
                    }
                    return Ok(manager);
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < config.initial_connection_retries {
                        warn!(
                            "Redis connection attempt {}/{} failed, retrying in {}ms",
                            attempt + 1,
                            config.initial_connection_retries + 1,
                            delay_ms
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(config.max_retry_delay_ms);
                    }
                }
            }
        }

        Err(AppError::storage(format!(
            "Failed to connect to Redis after {} attempts: {}",
            config.initial_connection_retries + 1,
            last_error.map_or_else(|| "unknown error".to_owned(), |e| e.to_string())
        )))
    }
}

#[async_trait]
impl ConversationStore for RedisStore {
    async fn put_record(&self, record: &ConversationRecord) -> AppResult<()> {
        let fields = record.to_fields()?;
        let mut conn = self.manager.clone();

        conn.hset_multiple::<_, _, _, ()>(record.key(), &fields)
            .await
            .map_err(|e| {
                error!("Redis HSET failed for {}: {}", record.key(), e);
                AppError::storage(format!("Record write failed: {e}"))
            })?;

        Ok(())
    }

    async fn add_to_index(&self, owner_id: &str, score: i64, record_key: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();

        conn.zadd::<_, _, _, ()>(super::index_key(owner_id), record_key, score)
            .await
            .map_err(|e| {
                error!("Redis ZADD failed for owner {}: {}", owner_id, e);
                AppError::storage(format!("Index write failed: {e}"))
            })?;

        Ok(())
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.manager.clone();

        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis PING failed: {}", e);
                AppError::storage(format!("Health check failed: {e}"))
            })?;

        Ok(response == "PONG")
    }
}
