//! Queue store trait
//!
//! The queue needs two structures from its store: a list (normal tasks) and a
//! sorted set scored by epoch seconds (delayable tasks). Implementations
//! acquire a connection per call and release it before returning.

use async_trait::async_trait;

use crate::error::QueueError;

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append a payload to the tail of the list at `key`
    async fn push_back(&self, key: &str, payload: &str) -> Result<(), QueueError>;

    /// Pop the head of the list at `key`
    async fn pop_front(&self, key: &str) -> Result<Option<String>, QueueError>;

    /// Add `payload` to the sorted set at `key` with `score`
    async fn add_scored(&self, key: &str, score: i64, payload: &str) -> Result<(), QueueError>;

    /// Members of the sorted set whose score lies in `[min, max]`, lowest score first
    async fn range_by_score(&self, key: &str, min: i64, max: i64)
        -> Result<Vec<String>, QueueError>;

    /// Remove members from the sorted set in one call; returns how many existed
    async fn remove_members(&self, key: &str, members: &[String]) -> Result<u64, QueueError>;
}
