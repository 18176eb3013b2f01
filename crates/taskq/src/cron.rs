//! Cron task registry
//!
//! Timing belongs to an external scheduler. The registry only keeps tasks by
//! name and hands the scheduler one `CronJob` per task; a job looks its task
//! up again when it fires, so re-registering a name affects later firings.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;
use tracing::{error, info, warn};

use crate::error::QueueError;
use crate::logging::{panic_message, CRON_LOG_TARGET};
use crate::task::CronTask;

/// Ordered, name-keyed set of cron tasks
pub struct CronRegistry {
    tasks: RwLock<Vec<Arc<dyn CronTask>>>,
    log_enabled: bool,
}

impl CronRegistry {
    pub fn new(log_enabled: bool) -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            log_enabled,
        }
    }

    /// Replace the task with the same name in place, or append it
    pub fn upsert(&self, task: Arc<dyn CronTask>) {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        match tasks.iter_mut().find(|t| t.name() == task.name()) {
            Some(slot) => *slot = task,
            None => tasks.push(task),
        }
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn CronTask>> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|t| t.name() == name)
            .cloned()
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<String> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the task registered under `name`; returns whether one was found.
    /// A panicking task is logged and does not unwind into the caller.
    pub async fn run(&self, name: &str) -> bool {
        let Some(task) = self.find(name) else {
            return false;
        };
        if self.log_enabled {
            info!(target: CRON_LOG_TARGET, "run cron task: {}", name);
        }
        if let Err(panic) = AssertUnwindSafe(task.run()).catch_unwind().await {
            error!(
                target: CRON_LOG_TARGET,
                task = name,
                panic = %panic_message(panic.as_ref()),
                "Cron task panicked"
            );
        }
        true
    }

    /// Register one job per task with `scheduler`, keyed by the task's spec.
    /// Rejected specs are logged and skipped; returns how many were accepted.
    pub fn schedule_all(self: &Arc<Self>, scheduler: &mut dyn CronScheduler) -> usize {
        let entries: Vec<(String, String)> = self
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|t| (t.spec().to_string(), t.name().to_string()))
            .collect();

        let mut accepted = 0;
        for (spec, name) in entries {
            let job = CronJob::new(Arc::clone(self), name.clone());
            match scheduler.add_job(&spec, job) {
                Ok(()) => accepted += 1,
                Err(e) => warn!(task = %name, spec = %spec, error = %e, "Scheduler rejected cron task"),
            }
        }
        accepted
    }
}

impl fmt::Debug for CronRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CronRegistry")
            .field("tasks", &self.names())
            .field("log_enabled", &self.log_enabled)
            .finish()
    }
}

/// What a scheduler fires: "run the cron task named `task_name`"
#[derive(Clone)]
pub struct CronJob {
    registry: Arc<CronRegistry>,
    task_name: String,
}

impl CronJob {
    pub fn new(registry: Arc<CronRegistry>, task_name: impl Into<String>) -> Self {
        Self {
            registry,
            task_name: task_name.into(),
        }
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Returns whether a task was still registered under the job's name
    pub async fn fire(&self) -> bool {
        self.registry.run(&self.task_name).await
    }
}

impl fmt::Debug for CronJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CronJob")
            .field("task_name", &self.task_name)
            .finish_non_exhaustive()
    }
}

/// An external scheduler that owns timing and fires jobs by spec
pub trait CronScheduler {
    fn add_job(&mut self, spec: &str, job: CronJob) -> Result<(), QueueError>;
}

/// Scheduler that only records jobs; the host fires them explicitly.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    jobs: Vec<(String, CronJob)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// `(spec, task name)` of every recorded job
    pub fn entries(&self) -> Vec<(&str, &str)> {
        self.jobs
            .iter()
            .map(|(spec, job)| (spec.as_str(), job.task_name()))
            .collect()
    }

    /// Fire every job registered under `spec`; returns how many ran a task
    pub async fn fire(&self, spec: &str) -> usize {
        let mut ran = 0;
        for (_, job) in self.jobs.iter().filter(|(s, _)| s == spec) {
            if job.fire().await {
                ran += 1;
            }
        }
        ran
    }
}

impl CronScheduler for ManualScheduler {
    fn add_job(&mut self, spec: &str, job: CronJob) -> Result<(), QueueError> {
        if spec.trim().is_empty() {
            return Err(QueueError::Config(format!(
                "empty schedule for cron task {}",
                job.task_name()
            )));
        }
        self.jobs.push((spec.to_string(), job));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Tagged {
        name: &'static str,
        spec: &'static str,
        hits: Arc<AtomicU32>,
    }

    #[async_trait]
    impl CronTask for Tagged {
        fn name(&self) -> &str {
            self.name
        }

        fn spec(&self) -> &str {
            self.spec
        }

        async fn run(&self) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tagged(name: &'static str, spec: &'static str) -> (Arc<dyn CronTask>, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let task = Arc::new(Tagged {
            name,
            spec,
            hits: hits.clone(),
        });
        (task, hits)
    }

    #[tokio::test]
    async fn test_upsert_replaces_in_place() {
        let registry = CronRegistry::new(false);
        let (a, _) = tagged("a", "@every 1m");
        let (b, _) = tagged("b", "@every 1m");
        let (a2, a2_hits) = tagged("a", "@every 5m");

        registry.upsert(a);
        registry.upsert(b);
        registry.upsert(a2);

        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(registry.find("a").unwrap().spec(), "@every 5m");
        assert!(registry.run("a").await);
        assert_eq!(a2_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_name_is_noop() {
        let registry = CronRegistry::new(true);
        assert!(!registry.run("missing").await);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rejected_specs_are_skipped() {
        let registry = Arc::new(CronRegistry::new(false));
        let (good, _) = tagged("good", "0 * * * * *");
        let (blank, _) = tagged("blank", "  ");
        registry.upsert(good);
        registry.upsert(blank);

        let mut scheduler = ManualScheduler::new();
        assert_eq!(registry.schedule_all(&mut scheduler), 1);
        assert_eq!(scheduler.entries(), vec![("0 * * * * *", "good")]);
    }

    struct Faulty;

    #[async_trait]
    impl CronTask for Faulty {
        fn name(&self) -> &str {
            "faulty"
        }

        fn spec(&self) -> &str {
            "@every 1m"
        }

        async fn run(&self) {
            panic!("cron handler blew up");
        }
    }

    #[tokio::test]
    async fn test_panicking_cron_task_does_not_escape_fire() {
        let registry = Arc::new(CronRegistry::new(true));
        let (steady, steady_hits) = tagged("steady", "@every 1m");
        registry.upsert(Arc::new(Faulty));
        registry.upsert(steady);

        let mut scheduler = ManualScheduler::new();
        assert_eq!(registry.schedule_all(&mut scheduler), 2);

        assert_eq!(scheduler.fire("@every 1m").await, 2);
        assert_eq!(steady_hits.load(Ordering::SeqCst), 1);
        assert!(registry.run("faulty").await);
    }
}
