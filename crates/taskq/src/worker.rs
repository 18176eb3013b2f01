//! Batch execution and the tick driver

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::logging::panic_message;
use crate::queue::TaskQueue;
use crate::runner::RunOutcome;
use crate::store::QueueStore;

/// Outcome of one poller or scanner tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Payloads claimed from the store
    pub collected: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Dropped without running (unknown task, undecodable payload)
    pub skipped: usize,
    /// Payloads whose processing panicked outside the task's own `run`
    /// (a task finder or `set_params`); their siblings still ran to completion
    pub panicked: usize,
}

impl TickReport {
    fn record(&mut self, outcome: RunOutcome) {
        match outcome {
            RunOutcome::Succeeded => self.succeeded += 1,
            RunOutcome::Failed { .. } => self.failed += 1,
            RunOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Whether every collected payload has been accounted for
    pub fn is_settled(&self) -> bool {
        self.succeeded + self.failed + self.skipped + self.panicked == self.collected
    }
}

/// Run `payloads` and wait for all of them.
///
/// A single payload runs inline; several run as one spawned task each. A panic
/// that escapes `run_mq_task` is counted in `panicked` and does not affect the
/// others.
pub(crate) async fn execute_batch<S>(queue: &Arc<TaskQueue<S>>, payloads: Vec<String>) -> TickReport
where
    S: QueueStore + ?Sized + 'static,
{
    let mut report = TickReport {
        collected: payloads.len(),
        ..Default::default()
    };

    match payloads.len() {
        0 => {}
        1 => match AssertUnwindSafe(queue.run_mq_task(&payloads[0]))
            .catch_unwind()
            .await
        {
            Ok(outcome) => report.record(outcome),
            Err(panic) => {
                error!(panic = %panic_message(panic.as_ref()), "Task panicked");
                report.panicked += 1;
            }
        },
        _ => {
            let handles: Vec<_> = payloads
                .into_iter()
                .map(|payload| {
                    let queue = Arc::clone(queue);
                    tokio::spawn(async move { queue.run_mq_task(&payload).await })
                })
                .collect();

            for joined in futures::future::join_all(handles).await {
                match joined {
                    Ok(outcome) => report.record(outcome),
                    Err(e) if e.is_panic() => {
                        error!(panic = %panic_message(e.into_panic().as_ref()), "Task panicked");
                        report.panicked += 1;
                    }
                    Err(e) => {
                        warn!(error = %e, "Task was cancelled before completion");
                        report.panicked += 1;
                    }
                }
            }
        }
    }

    report
}

/// Await a whole tick, turning an escaped panic into a log line
pub(crate) async fn guard_tick<F>(name: &'static str, tick: F) -> TickReport
where
    F: Future<Output = TickReport>,
{
    match AssertUnwindSafe(tick).catch_unwind().await {
        Ok(report) => report,
        Err(panic) => {
            error!(tick = name, panic = %panic_message(panic.as_ref()), "Tick panicked");
            TickReport::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum TickKind {
    Normal,
    Delayable,
}

/// Drives poller and scanner ticks on fixed intervals until shut down.
///
/// Ticks of one kind never overlap: the next normal tick starts only after
/// the previous one has joined all its tasks.
pub struct TickDriver<S: QueueStore + ?Sized + 'static> {
    queue: Arc<TaskQueue<S>>,
    shutdown: watch::Sender<bool>,
}

impl<S: QueueStore + ?Sized + 'static> TickDriver<S> {
    pub fn new(queue: Arc<TaskQueue<S>>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self { queue, shutdown }
    }

    /// Ask `run` to return after the ticks in flight complete
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub async fn run(&self) {
        let config = self.queue.config();
        info!(
            normal_tick_ms = config.normal_tick_ms,
            delayable_tick_ms = config.delayable_tick_ms,
            "Tick driver started"
        );

        tokio::join!(
            self.tick_loop(TickKind::Normal),
            self.tick_loop(TickKind::Delayable),
        );

        info!("Tick driver stopped");
    }

    async fn tick_loop(&self, kind: TickKind) {
        let period = match kind {
            TickKind::Normal => self.queue.config().normal_tick(),
            TickKind::Delayable => self.queue.config().delayable_tick(),
        };
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.subscribe();

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => continue,
            }

            let report = match kind {
                TickKind::Normal => self.queue.run_normal_tick().await,
                TickKind::Delayable => self.queue.run_delayable_tick().await,
            };
            if report.collected > 0 {
                debug!(
                    kind = ?kind,
                    collected = report.collected,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    skipped = report.skipped,
                    panicked = report.panicked,
                    "Tick finished"
                );
            }
        }
    }
}
