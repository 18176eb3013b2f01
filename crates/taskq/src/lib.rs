//! # taskq
//!
//! Store-backed task queue for background work.
//!
//! Features:
//! - `Task` / `CronTask` traits resolved by name at execution time
//! - Normal tasks (FIFO list) and delayable tasks (sorted set scored by run time)
//! - Pluggable store (`MemoryStore` here, Redis in `taskq-redis`)
//! - Batched ticks with concurrent execution and per-task panic isolation
//! - Retry with a fixed interval, bounded by a retry policy
//! - Cron registry dispatched through an external scheduler
//!
//! ```ignore
//! let queue = Arc::new(TaskQueue::new(MemoryStore::new(), QueueConfig::default()));
//! queue.set_task_finder(|name| match name {
//!     "send_email" => Some(Box::new(SendEmail::default()) as Box<dyn Task>),
//!     _ => None,
//! });
//! queue.publish(&SendEmail::to("ops@example.com"), Some(RetryPolicy::new(2, Duration::from_secs(1)))).await?;
//! queue.run_normal_tick().await;
//! ```

pub mod config;
pub mod cron;
pub mod error;
mod logging;
pub mod memory;
pub mod payload;
mod poller;
mod publisher;
pub mod queue;
pub mod retry;
pub mod runner;
mod scanner;
pub mod store;
pub mod task;
pub mod time;
pub mod worker;

pub use config::QueueConfig;
pub use cron::{CronJob, CronRegistry, CronScheduler, ManualScheduler};
pub use error::QueueError;
pub use memory::MemoryStore;
pub use payload::{QueuePayload, TaskKind};
pub use queue::{TaskFinder, TaskQueue};
pub use retry::RetryPolicy;
pub use runner::RunOutcome;
pub use store::QueueStore;
pub use task::{CronTask, Task, TaskParams};
pub use time::TimeUnit;
pub use worker::{TickDriver, TickReport};
