//! Publish command - push a task onto the queue by name
//!
//! Usage:
//!   taskq publish <NAME> [--params JSON] [--delay N --unit s] [--retry-attempts N --retry-interval-ms MS]

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Args;
use taskq::{RetryPolicy, Task, TaskParams, TaskQueue, TimeUnit};

use super::{open_store, queue_config};

#[derive(Args)]
pub struct PublishArgs {
    /// Task name as registered with the consuming worker
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Task parameters as a JSON object
    #[arg(long, short = 'p', value_name = "JSON")]
    pub params: Option<String>,

    /// Publish as delayable, due this many units from now
    #[arg(long, short = 'd', value_name = "N")]
    pub delay: Option<i64>,

    /// Unit for --delay (ms, s, m, h, d)
    #[arg(long, short = 'u', default_value = "s", requires = "delay")]
    pub unit: String,

    /// Retries allowed after the first failure
    #[arg(long, value_name = "N", requires = "retry_interval_ms")]
    pub retry_attempts: Option<u32>,

    /// Wait between retries in milliseconds
    #[arg(long, value_name = "MS", requires = "retry_attempts")]
    pub retry_interval_ms: Option<u64>,
}

/// Stand-in carrying only what goes on the wire; never run locally.
#[derive(Debug)]
struct NamedTask {
    name: String,
    params: TaskParams,
}

#[async_trait]
impl Task for NamedTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> Option<&TaskParams> {
        Some(&self.params)
    }

    async fn run(&mut self) -> bool {
        false
    }
}

fn parse_params(raw: Option<&str>) -> Result<TaskParams> {
    let Some(raw) = raw else {
        return Ok(TaskParams::new());
    };
    match serde_json::from_str::<serde_json::Value>(raw).context("--params is not valid JSON")? {
        serde_json::Value::Object(map) => Ok(map),
        other => bail!("--params must be a JSON object, got {other}"),
    }
}

pub async fn run(args: PublishArgs, redis_url: &str) -> Result<()> {
    if args.name.trim().is_empty() {
        bail!("Task name must not be empty");
    }
    let params = parse_params(args.params.as_deref())?;
    let unit: TimeUnit = args.unit.parse()?;
    let policy = match (args.retry_attempts, args.retry_interval_ms) {
        (Some(attempts), Some(interval)) => Some(RetryPolicy::new(attempts, Duration::from_millis(interval))),
        _ => None,
    };

    let config = queue_config()?;
    let store = open_store(redis_url)?;
    let queue = TaskQueue::new(store, config);
    let task = NamedTask {
        name: args.name,
        params,
    };

    match args.delay {
        Some(amount) => {
            if unit.duration(amount).is_none() {
                bail!("--delay must be a positive amount of {unit}s");
            }
            queue
                .publish_with_delay(&task, amount, unit, policy)
                .await
                .with_context(|| format!("Failed to publish delayable task {}", task.name))?;
            crate::print_success(&format!(
                "Published delayable task {} (due in {} {})",
                task.name, amount, unit
            ));
        }
        None => {
            queue
                .publish(&task, policy)
                .await
                .with_context(|| format!("Failed to publish task {}", task.name))?;
            crate::print_success(&format!("Published task {}", task.name));
        }
    }

    if let Some(policy) = policy {
        crate::print_info(&format!(
            "Retries: {} at {}ms",
            policy.retry_attempts(),
            policy.retry_interval().as_millis()
        ));
    }
    Ok(())
}
