//! Redis-backed store for `taskq`
//!
//! Normal tasks live in a list (`RPUSH` / `LPOP`), delayable tasks in a
//! sorted set scored by run time (`ZADD` / `ZRANGEBYSCORE` / `ZREM`).
//!
//! Each store call opens a multiplexed connection under `connect_timeout`
//! and drops it when the call returns. A refused or slow connection is
//! reported as `QueueError::Unavailable` / `QueueError::Timeout`, which the
//! poller and scanner treat as "no store this tick".

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use taskq::{QueueError, QueueStore};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum RedisStoreError {
    #[error("Invalid Redis URL: {0}")]
    InvalidUrl(String),

    #[error("Redis command error: {0}")]
    Command(#[from] redis::RedisError),
}

impl From<RedisStoreError> for QueueError {
    fn from(e: RedisStoreError) -> Self {
        match e {
            RedisStoreError::InvalidUrl(url) => QueueError::Config(format!("invalid Redis URL: {url}")),
            RedisStoreError::Command(e) => map_redis_error(e),
        }
    }
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis URL (env: REDIS_URL)
    pub url: String,
    /// Upper bound on opening a connection (env: TASKQ_REDIS_CONNECT_TIMEOUT_MS)
    pub connect_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connect_timeout_ms: 1000,
        }
    }
}

impl RedisConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env::var("REDIS_URL").unwrap_or(defaults.url),
            connect_timeout_ms: env::var("TASKQ_REDIS_CONNECT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.connect_timeout_ms),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

pub struct RedisStore {
    client: redis::Client,
    connect_timeout: Duration,
}

impl RedisStore {
    /// Validate the URL; no connection is made until the first call.
    pub fn open(config: &RedisConfig) -> Result<Self, RedisStoreError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| RedisStoreError::InvalidUrl(format!("{}: {}", config.url, e)))?;
        Ok(Self {
            client,
            connect_timeout: config.connect_timeout(),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, QueueError> {
        match tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(QueueError::Unavailable(e.to_string())),
            Err(_) => Err(QueueError::Timeout(self.connect_timeout)),
        }
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("connection_info", self.client.get_connection_info())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Connection-level failures mean the store is unreachable; everything else
/// is a failed command.
fn map_redis_error(e: redis::RedisError) -> QueueError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
        QueueError::Unavailable(e.to_string())
    } else {
        QueueError::Store(e.to_string())
    }
}

#[async_trait]
impl QueueStore for RedisStore {
    async fn push_back(&self, key: &str, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("RPUSH")
            .arg(key)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn pop_front(&self, key: &str) -> Result<Option<String>, QueueError> {
        let mut conn = self.connection().await?;
        redis::cmd("LPOP")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn add_scored(&self, key: &str, score: i64, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn range_by_score(
        &self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<Vec<String>, QueueError> {
        let mut conn = self.connection().await?;
        redis::cmd("ZRANGEBYSCORE")
            .arg(key)
            .arg(min)
            .arg(max)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn remove_members(&self, key: &str, members: &[String]) -> Result<u64, QueueError> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        let removed: u64 = redis::cmd("ZREM")
            .arg(key)
            .arg(members)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        debug!(key, requested = members.len(), removed, "ZREM");
        Ok(removed)
    }
}
