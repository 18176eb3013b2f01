//! Executing a single queue payload
//!
//! Shared by the normal poller and the delayable scanner: decode, resolve the
//! task by name, run it, and on failure re-publish it as a delayable task
//! while its retry policy allows.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::logging::{outcome, panic_message, task_detail, MQ_LOG_TARGET};
use crate::payload::QueuePayload;
use crate::queue::TaskQueue;
use crate::retry::RetryPolicy;
use crate::store::QueueStore;
use crate::task::Task;

/// What happened to one payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Dropped before execution: no finder, undecodable payload, empty or unknown name
    Skipped,
    Succeeded,
    /// The task returned `false` or panicked; `retry` is the policy it was
    /// re-published with
    Failed { retry: Option<RetryPolicy> },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl<S: QueueStore + ?Sized + 'static> TaskQueue<S> {
    /// Run one serialized payload. Never fails: problems are logged and the
    /// payload is dropped or re-published according to its retry state.
    pub async fn run_mq_task(&self, raw: &str) -> RunOutcome {
        let Some(finder) = self.task_finder() else {
            return RunOutcome::Skipped;
        };

        let payload = match QueuePayload::from_json(raw) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "Dropping undecodable queue payload");
                return RunOutcome::Skipped;
            }
        };
        if payload.task_name.is_empty() {
            debug!("Dropping queue payload without a task name");
            return RunOutcome::Skipped;
        }
        let Some(mut task) = finder(&payload.task_name) else {
            debug!(task = %payload.task_name, "No task registered under this name");
            return RunOutcome::Skipped;
        };

        let params = payload.task_params.clone().filter(|p| !p.is_empty());
        if let Some(params) = &params {
            task.set_params(params.clone());
        }

        let kind = payload.kind();
        let detail = task_detail(
            &payload.task_name,
            payload.run_at.as_deref(),
            params.as_ref(),
        );

        if self.config.mq_log_enabled {
            info!(target: MQ_LOG_TARGET, "run {} task: {}", kind, detail);
        }

        // A panicking handler counts as a failed run and stays retryable.
        let success = match AssertUnwindSafe(task.run()).catch_unwind().await {
            Ok(success) => success,
            Err(panic) => {
                error!(
                    task = %payload.task_name,
                    panic = %panic_message(panic.as_ref()),
                    "Task panicked"
                );
                false
            }
        };

        if self.config.mq_log_enabled {
            info!(
                target: MQ_LOG_TARGET,
                "{} to run {} task: {}",
                outcome(success),
                kind,
                detail
            );
        }

        if success {
            return RunOutcome::Succeeded;
        }
        RunOutcome::Failed {
            retry: self.schedule_retry(task.as_ref(), &payload).await,
        }
    }

    async fn schedule_retry(&self, task: &dyn Task, payload: &QueuePayload) -> Option<RetryPolicy> {
        let current = payload.retry_policy();
        if !current.is_enabled() {
            return None;
        }
        let Some(next) = current.next_attempt() else {
            debug!(
                task = %payload.task_name,
                retry_attempts = current.retry_attempts(),
                "Retries exhausted, dropping task"
            );
            return None;
        };

        let delay = chrono::Duration::from_std(next.retry_interval()).ok()?;
        let run_at = self.now().checked_add_signed(delay)?;

        debug!(
            task = %payload.task_name,
            fail_times = next.fail_times(),
            retry_attempts = next.retry_attempts(),
            delay_ms = delay.num_milliseconds(),
            "Task failed, scheduling retry"
        );

        match self.publish_delayable(task, run_at, Some(next)).await {
            Ok(()) => Some(next),
            Err(e) => {
                warn!(task = %payload.task_name, error = %e, "Retry could not be published, task dropped");
                None
            }
        }
    }
}
