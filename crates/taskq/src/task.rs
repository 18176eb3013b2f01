//! Task definitions

use async_trait::async_trait;
use std::fmt::Debug;

/// Parameter bag carried in a payload's `taskParams`
pub type TaskParams = serde_json::Map<String, serde_json::Value>;

/// A unit of work published to the queue and resolved by name when it runs.
///
/// The queue never serializes the task itself: it stores the name and
/// parameters, and the registered task finder builds a fresh instance for
/// every execution.
#[async_trait]
pub trait Task: Send + Sync + Debug {
    /// Task name, the key the task finder resolves
    fn name(&self) -> &str;

    /// Parameters to publish with the task
    fn params(&self) -> Option<&TaskParams> {
        None
    }

    /// Receive the parameters of the payload being executed
    fn set_params(&mut self, _params: TaskParams) {}

    /// Execute the task; `false` marks a failure eligible for retry
    async fn run(&mut self) -> bool;
}

/// A recurring task triggered by an external scheduler
#[async_trait]
pub trait CronTask: Send + Sync {
    /// Unique key in the cron registry
    fn name(&self) -> &str;

    /// Schedule expression handed to the scheduler, e.g. `0 */5 * * * *`
    fn spec(&self) -> &str;

    async fn run(&self);
}
