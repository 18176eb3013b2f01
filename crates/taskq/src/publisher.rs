//! Publishing tasks to the normal list and the delayable set

use chrono::{DateTime, TimeZone};
use tracing::{debug, info, warn};

use crate::error::QueueError;
use crate::logging::{outcome, task_detail, MQ_LOG_TARGET};
use crate::payload::QueuePayload;
use crate::queue::TaskQueue;
use crate::retry::RetryPolicy;
use crate::store::QueueStore;
use crate::task::Task;
use crate::time::{format_run_at, TimeUnit};

impl<S: QueueStore + ?Sized + 'static> TaskQueue<S> {
    /// Push `task` to the tail of the normal list.
    ///
    /// The outcome is logged; the returned error is informational and may be
    /// ignored by fire-and-forget callers.
    pub async fn publish(
        &self,
        task: &dyn Task,
        policy: Option<RetryPolicy>,
    ) -> Result<(), QueueError> {
        let payload = QueuePayload::for_task(task, policy.as_ref());
        let result = match payload.to_json() {
            Ok(raw) => self.store.push_back(&self.config.normal_key, &raw).await,
            Err(e) => Err(e),
        };

        if self.config.mq_log_enabled {
            let detail = task_detail(task.name(), None, payload.task_params.as_ref());
            info!(
                target: MQ_LOG_TARGET,
                "{} to publish normal task: {}",
                outcome(result.is_ok()),
                detail
            );
        }
        if let Err(e) = &result {
            warn!(task = task.name(), error = %e, "Failed to publish normal task");
        }
        result
    }

    /// Add `task` to the delayable set, due at `run_at`.
    ///
    /// The score is `run_at` in epoch seconds; the payload's `runAt` text is
    /// written in the configured zone.
    pub async fn publish_delayable<Tz: TimeZone>(
        &self,
        task: &dyn Task,
        run_at: DateTime<Tz>,
        policy: Option<RetryPolicy>,
    ) -> Result<(), QueueError> {
        let run_at = run_at.with_timezone(&self.zone);
        let run_at_text = format_run_at(&run_at);
        let payload =
            QueuePayload::for_task(task, policy.as_ref()).with_run_at(run_at_text.clone());

        let result = match payload.to_json() {
            Ok(raw) => {
                self.store
                    .add_scored(&self.config.delayable_key, run_at.timestamp(), &raw)
                    .await
            }
            Err(e) => Err(e),
        };

        if self.config.mq_log_enabled {
            let detail = task_detail(
                task.name(),
                Some(&run_at_text),
                payload.task_params.as_ref(),
            );
            info!(
                target: MQ_LOG_TARGET,
                "{} to publish delayable task: {}",
                outcome(result.is_ok()),
                detail
            );
        }
        if let Err(e) = &result {
            warn!(task = task.name(), run_at = %run_at_text, error = %e, "Failed to publish delayable task");
        }
        result
    }

    /// Publish `task` as delayable, due `amount` `unit`s from now.
    ///
    /// A non-positive or overflowing delay publishes nothing.
    pub async fn publish_with_delay(
        &self,
        task: &dyn Task,
        amount: i64,
        unit: TimeUnit,
        policy: Option<RetryPolicy>,
    ) -> Result<(), QueueError> {
        let Some(delay) = unit.duration(amount) else {
            debug!(task = task.name(), amount, unit = %unit, "Skipping publish with non-positive delay");
            return Ok(());
        };
        let Some(run_at) = self.now().checked_add_signed(delay) else {
            debug!(task = task.name(), amount, unit = %unit, "Skipping publish with out-of-range delay");
            return Ok(());
        };
        self.publish_delayable(task, run_at, policy).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::memory::MemoryStore;
    use crate::task::TaskParams;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, FixedOffset};
    use serde_json::json;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct Noop {
        params: TaskParams,
    }

    #[async_trait]
    impl Task for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        fn params(&self) -> Option<&TaskParams> {
            Some(&self.params)
        }

        async fn run(&mut self) -> bool {
            true
        }
    }

    fn queue() -> TaskQueue<MemoryStore> {
        TaskQueue::new(MemoryStore::new(), QueueConfig::default())
    }

    #[tokio::test]
    async fn test_publish_appends_to_normal_list() {
        let queue = queue();
        let mut params = TaskParams::new();
        params.insert("n".into(), json!(1));

        queue.publish(&Noop::default(), None).await.unwrap();
        queue.publish(&Noop { params }, None).await.unwrap();

        let items = queue.store().list_items("taskq:mq:normal").await;
        assert_eq!(
            items,
            vec![
                r#"{"taskName":"noop"}"#.to_string(),
                r#"{"taskName":"noop","taskParams":{"n":1}}"#.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_publish_delayable_scores_by_epoch_seconds() {
        let queue = queue();
        let utc = FixedOffset::east_opt(0).unwrap();
        let run_at = utc.with_ymd_and_hms(2024, 5, 1, 0, 30, 0).unwrap();
        let policy = RetryPolicy::new(3, Duration::from_millis(250));

        queue
            .publish_delayable(&Noop::default(), run_at, Some(policy))
            .await
            .unwrap();

        let members = queue.store().scored_members("taskq:mq:delayable").await;
        assert_eq!(members.len(), 1);
        let (raw, score) = &members[0];
        assert_eq!(*score, run_at.timestamp());

        let payload = QueuePayload::from_json(raw).unwrap();
        // Written in the default +08:00 zone
        assert_eq!(payload.run_at.as_deref(), Some("2024-05-01 08:30:00"));
        assert_eq!(payload.fail_times, Some(0));
        assert_eq!(payload.retry_attempts, Some(3));
        assert_eq!(payload.retry_interval, Some(250));
    }

    #[tokio::test]
    async fn test_publish_with_delay_computes_run_at() {
        let queue = queue();
        let before = queue.now();

        queue
            .publish_with_delay(&Noop::default(), 2, TimeUnit::Minute, None)
            .await
            .unwrap();

        let members = queue.store().scored_members("taskq:mq:delayable").await;
        assert_eq!(members.len(), 1);
        let expected = (before + ChronoDuration::minutes(2)).timestamp();
        assert!((members[0].1 - expected).abs() <= 1);
    }

    #[tokio::test]
    async fn test_publish_with_non_positive_delay_is_noop() {
        let queue = queue();
        queue
            .publish_with_delay(&Noop::default(), 0, TimeUnit::Second, None)
            .await
            .unwrap();
        queue
            .publish_with_delay(&Noop::default(), -5, TimeUnit::Day, None)
            .await
            .unwrap();
        assert!(queue.store().scored_members("taskq:mq:delayable").await.is_empty());
    }

    #[tokio::test]
    async fn test_publish_reports_store_failure() {
        let queue = queue();
        queue.store().set_offline(true);
        let err = queue.publish(&Noop::default(), None).await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
