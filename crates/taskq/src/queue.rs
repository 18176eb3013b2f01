//! The task-queue service object
//!
//! `TaskQueue` owns everything the queue needs at runtime: the store handle,
//! configuration, the task finder and the cron registry. Publishing, ticking
//! and cron dispatch are methods on it (see `publisher`, `poller`, `scanner`,
//! `runner` and `cron`).

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, FixedOffset, Utc};

use crate::config::QueueConfig;
use crate::cron::{CronRegistry, CronScheduler};
use crate::store::QueueStore;
use crate::task::{CronTask, Task};

/// Resolves a task name to a fresh, runnable task instance
pub type TaskFinder = Arc<dyn Fn(&str) -> Option<Box<dyn Task>> + Send + Sync>;

pub struct TaskQueue<S: QueueStore + ?Sized> {
    pub(crate) store: Arc<S>,
    pub(crate) config: QueueConfig,
    pub(crate) zone: FixedOffset,
    finder: RwLock<Option<TaskFinder>>,
    cron: Arc<CronRegistry>,
}

impl<S: QueueStore + 'static> TaskQueue<S> {
    pub fn new(store: S, config: QueueConfig) -> Self {
        Self::new_with_arc(Arc::new(store), config)
    }
}

impl<S: QueueStore + ?Sized + 'static> TaskQueue<S> {
    /// Create a queue over an existing Arc store (supports dyn dispatch)
    pub fn new_with_arc(store: Arc<S>, config: QueueConfig) -> Self {
        Self {
            store,
            zone: config.zone(),
            cron: Arc::new(CronRegistry::new(config.cron_log_enabled)),
            config,
            finder: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Current time in the configured zone
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.zone)
    }

    /// Install the task finder, replacing any previous one
    pub fn set_task_finder<F>(&self, finder: F)
    where
        F: Fn(&str) -> Option<Box<dyn Task>> + Send + Sync + 'static,
    {
        *self.finder.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(finder));
    }

    pub(crate) fn task_finder(&self) -> Option<TaskFinder> {
        self.finder
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn cron(&self) -> &Arc<CronRegistry> {
        &self.cron
    }

    /// Register a cron task, replacing one with the same name
    pub fn with_cron_task(&self, task: Arc<dyn CronTask>) {
        self.cron.upsert(task);
    }

    /// Run the cron task registered under `name`; returns whether one ran
    pub async fn run_cron_task(&self, name: &str) -> bool {
        self.cron.run(name).await
    }

    /// Hand every registered cron task to `scheduler`; returns how many were accepted
    pub fn handle_cron_tasks(&self, scheduler: &mut dyn CronScheduler) -> usize {
        self.cron.schedule_all(scheduler)
    }
}

impl<S: QueueStore + ?Sized> fmt::Debug for TaskQueue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("config", &self.config)
            .field("cron", &self.cron)
            .finish_non_exhaustive()
    }
}
