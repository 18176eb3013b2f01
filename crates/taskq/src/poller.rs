//! Normal queue poller

use std::sync::Arc;

use tracing::{debug, warn};

use crate::queue::TaskQueue;
use crate::store::QueueStore;
use crate::worker::{execute_batch, guard_tick, TickReport};

impl<S: QueueStore + ?Sized + 'static> TaskQueue<S> {
    /// One tick of the normal queue: pop up to `batch_size` payloads, pausing
    /// `poll_pacing` after each pop, then run them and wait for all.
    ///
    /// A drained list or an unavailable store ends collection early; what was
    /// already popped still runs.
    pub async fn run_normal_tick(self: &Arc<Self>) -> TickReport {
        guard_tick("normal", async {
            let payloads = self.collect_normal().await;
            execute_batch(self, payloads).await
        })
        .await
    }

    async fn collect_normal(&self) -> Vec<String> {
        let key = &self.config.normal_key;
        let limit = self.config.batch_size;
        let pacing = self.config.poll_pacing();
        let mut payloads = Vec::with_capacity(limit);

        // At most `limit` pops per tick, empty ones included.
        for _ in 0..limit {
            match self.store.pop_front(key).await {
                Ok(Some(payload)) => {
                    if !payload.is_empty() {
                        payloads.push(payload);
                    }
                }
                Ok(None) => break,
                Err(e) if e.is_unavailable() => {
                    debug!(error = %e, collected = payloads.len(), "Store unavailable, ending normal collection");
                    break;
                }
                Err(e) => warn!(error = %e, "Failed to pop normal queue"),
            }
            tokio::time::sleep(pacing).await;
        }

        payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::memory::MemoryStore;
    use crate::task::Task;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct Count(Arc<AtomicU32>);

    #[async_trait]
    impl Task for Count {
        fn name(&self) -> &str {
            "count"
        }

        async fn run(&mut self) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn queue(batch_size: usize) -> (Arc<TaskQueue<MemoryStore>>, Arc<AtomicU32>) {
        let config = QueueConfig {
            batch_size,
            poll_pacing_ms: 1,
            ..Default::default()
        };
        let queue = Arc::new(TaskQueue::new(MemoryStore::new(), config));
        let counter = Arc::new(AtomicU32::new(0));
        let shared = counter.clone();
        queue.set_task_finder(move |name| {
            (name == "count").then(|| Box::new(Count(shared.clone())) as Box<dyn Task>)
        });
        (queue, counter)
    }

    #[tokio::test]
    async fn test_tick_caps_batch_size() {
        let (queue, counter) = queue(10);
        let store = queue.store();
        for _ in 0..12 {
            store.push_back("taskq:mq:normal", r#"{"taskName":"count"}"#).await.unwrap();
        }

        let report = queue.run_normal_tick().await;
        assert_eq!(report.collected, 10);
        assert_eq!(report.succeeded, 10);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(store.list_len("taskq:mq:normal").await, 2);
    }

    #[tokio::test]
    async fn test_empty_queue_runs_nothing() {
        let (queue, counter) = queue(3);
        let report = tokio::time::timeout(Duration::from_secs(2), queue.run_normal_tick())
            .await
            .expect("empty tick must return");
        assert_eq!(report, TickReport::default());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_underfilled_tick_returns_with_default_pacing() {
        let config = QueueConfig::default();
        let queue = Arc::new(TaskQueue::new(MemoryStore::new(), config));
        let counter = Arc::new(AtomicU32::new(0));
        let shared = counter.clone();
        queue.set_task_finder(move |name| {
            (name == "count").then(|| Box::new(Count(shared.clone())) as Box<dyn Task>)
        });
        queue
            .store()
            .push_back("taskq:mq:normal", r#"{"taskName":"count"}"#)
            .await
            .unwrap();

        // 10 pops at 50ms is the most a tick may spend collecting.
        let report = tokio::time::timeout(Duration::from_secs(3), queue.run_normal_tick())
            .await
            .expect("under-filled tick must return");
        assert_eq!(report.collected, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_payloads_count_against_the_batch() {
        let (queue, counter) = queue(3);
        let store = queue.store();
        for _ in 0..5 {
            store.push_back("taskq:mq:normal", "").await.unwrap();
        }
        store.push_back("taskq:mq:normal", r#"{"taskName":"count"}"#).await.unwrap();

        let report = queue.run_normal_tick().await;
        assert_eq!(report.collected, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(store.list_len("taskq:mq:normal").await, 3);
    }

    #[tokio::test]
    async fn test_offline_store_ends_tick_quietly() {
        let (queue, counter) = queue(10);
        queue
            .store()
            .push_back("taskq:mq:normal", r#"{"taskName":"count"}"#)
            .await
            .unwrap();
        queue.store().set_offline(true);

        let report = queue.run_normal_tick().await;
        assert_eq!(report.collected, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        queue.store().set_offline(false);
        assert_eq!(queue.run_normal_tick().await.succeeded, 1);
    }
}
