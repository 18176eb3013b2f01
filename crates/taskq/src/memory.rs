//! In-memory store with list and sorted-set semantics

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::error::QueueError;
use crate::store::QueueStore;

/// Process-local store, for tests and single-process deployments.
///
/// `set_offline(true)` makes every call fail with `QueueError::Unavailable`,
/// the way a store behaves when no connection can be acquired.
#[derive(Debug, Default)]
pub struct MemoryStore {
    lists: RwLock<HashMap<String, VecDeque<String>>>,
    sets: RwLock<HashMap<String, HashMap<String, i64>>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Length of the list at `key`
    pub async fn list_len(&self, key: &str) -> usize {
        self.lists.read().await.get(key).map_or(0, VecDeque::len)
    }

    /// Contents of the list at `key`, head first
    pub async fn list_items(&self, key: &str) -> Vec<String> {
        self.lists
            .read()
            .await
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Members of the sorted set at `key` with their scores, lowest first
    pub async fn scored_members(&self, key: &str) -> Vec<(String, i64)> {
        let sets = self.sets.read().await;
        let mut members: Vec<(String, i64)> = sets
            .get(key)
            .map(|set| set.iter().map(|(m, s)| (m.clone(), *s)).collect())
            .unwrap_or_default();
        members.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        members
    }

    fn check_online(&self) -> Result<(), QueueError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(QueueError::Unavailable("memory store is offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn push_back(&self, key: &str, payload: &str) -> Result<(), QueueError> {
        self.check_online()?;
        self.lists
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .push_back(payload.to_string());
        Ok(())
    }

    async fn pop_front(&self, key: &str) -> Result<Option<String>, QueueError> {
        self.check_online()?;
        let mut lists = self.lists.write().await;
        Ok(lists.get_mut(key).and_then(VecDeque::pop_front))
    }

    async fn add_scored(&self, key: &str, score: i64, payload: &str) -> Result<(), QueueError> {
        self.check_online()?;
        // Re-adding an existing member only moves its score.
        self.sets
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .insert(payload.to_string(), score);
        Ok(())
    }

    async fn range_by_score(
        &self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<Vec<String>, QueueError> {
        self.check_online()?;
        Ok(self
            .scored_members(key)
            .await
            .into_iter()
            .filter(|(_, score)| (min..=max).contains(score))
            .map(|(member, _)| member)
            .collect())
    }

    async fn remove_members(&self, key: &str, members: &[String]) -> Result<u64, QueueError> {
        self.check_online()?;
        let mut sets = self.sets.write().await;
        let Some(set) = sets.get_mut(key) else {
            return Ok(0);
        };
        let removed = members
            .iter()
            .filter(|member| set.remove(member.as_str()).is_some())
            .count();
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_is_fifo() {
        let store = MemoryStore::new();
        store.push_back("q", "a").await.unwrap();
        store.push_back("q", "b").await.unwrap();

        assert_eq!(store.pop_front("q").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.pop_front("q").await.unwrap().as_deref(), Some("b"));
        assert!(store.pop_front("q").await.unwrap().is_none());
        assert!(store.pop_front("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_range_by_score_is_inclusive_and_ordered() {
        let store = MemoryStore::new();
        store.add_scored("z", 30, "late").await.unwrap();
        store.add_scored("z", 10, "early").await.unwrap();
        store.add_scored("z", 20, "mid").await.unwrap();
        store.add_scored("z", 40, "out").await.unwrap();

        let hits = store.range_by_score("z", 10, 30).await.unwrap();
        assert_eq!(hits, vec!["early", "mid", "late"]);
    }

    #[tokio::test]
    async fn test_remove_members_counts_existing_only() {
        let store = MemoryStore::new();
        store.add_scored("z", 1, "a").await.unwrap();
        store.add_scored("z", 2, "b").await.unwrap();

        let removed = store
            .remove_members("z", &["a".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.scored_members("z").await, vec![("b".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_offline_store_is_unavailable() {
        let store = MemoryStore::new();
        store.set_offline(true);

        let err = store.push_back("q", "a").await.unwrap_err();
        assert!(err.is_unavailable());

        store.set_offline(false);
        store.push_back("q", "a").await.unwrap();
        assert_eq!(store.list_len("q").await, 1);
    }
}
