//! Queue configuration
//!
//! Store keys, batch sizing, scan windows, time zone and log switches.
//! Every field can be overridden from `TASKQ_*` environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// UTC+08:00, the offset of Asia/Shanghai (no DST).
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 8 * 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// List holding normal tasks (env: TASKQ_NORMAL_KEY)
    pub normal_key: String,
    /// Sorted set holding delayable tasks (env: TASKQ_DELAYABLE_KEY)
    pub delayable_key: String,
    /// Max payloads collected per tick (env: TASKQ_BATCH_SIZE)
    pub batch_size: usize,
    /// Pause between two pops of the normal list (env: TASKQ_POLL_PACING_MS)
    pub poll_pacing_ms: u64,
    /// How late a delayable task may still be picked up (env: TASKQ_DUE_LOOKBACK_SECS)
    pub due_lookback_secs: i64,
    /// How far ahead delayable tasks are prefetched (env: TASKQ_DUE_LOOKAHEAD_SECS)
    pub due_lookahead_secs: i64,
    /// Bound on the delayable scan's store access (env: TASKQ_ACQUIRE_TIMEOUT_MS)
    pub acquire_timeout_ms: u64,
    /// Tick period used by `TickDriver` for the normal list (env: TASKQ_NORMAL_TICK_MS)
    pub normal_tick_ms: u64,
    /// Tick period used by `TickDriver` for the sorted set (env: TASKQ_DELAYABLE_TICK_MS)
    pub delayable_tick_ms: u64,
    /// Offset used to format and parse `runAt` (env: TASKQ_UTC_OFFSET_SECS)
    pub utc_offset_secs: i32,
    /// Log publish/run lines for queue tasks (env: TASKQ_MQ_LOG)
    pub mq_log_enabled: bool,
    /// Log run lines for cron tasks (env: TASKQ_CRON_LOG)
    pub cron_log_enabled: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            normal_key: "taskq:mq:normal".to_string(),
            delayable_key: "taskq:mq:delayable".to_string(),
            batch_size: 10,
            poll_pacing_ms: 50,
            due_lookback_secs: 60,
            due_lookahead_secs: 5,
            acquire_timeout_ms: 1000,
            normal_tick_ms: 1000,
            delayable_tick_ms: 1000,
            utc_offset_secs: DEFAULT_UTC_OFFSET_SECS,
            mq_log_enabled: false,
            cron_log_enabled: false,
        }
    }
}

impl QueueConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            normal_key: env::var("TASKQ_NORMAL_KEY").unwrap_or(defaults.normal_key),
            delayable_key: env::var("TASKQ_DELAYABLE_KEY").unwrap_or(defaults.delayable_key),
            batch_size: env_parse("TASKQ_BATCH_SIZE", defaults.batch_size),
            poll_pacing_ms: env_parse("TASKQ_POLL_PACING_MS", defaults.poll_pacing_ms),
            due_lookback_secs: env_parse("TASKQ_DUE_LOOKBACK_SECS", defaults.due_lookback_secs),
            due_lookahead_secs: env_parse("TASKQ_DUE_LOOKAHEAD_SECS", defaults.due_lookahead_secs),
            acquire_timeout_ms: env_parse("TASKQ_ACQUIRE_TIMEOUT_MS", defaults.acquire_timeout_ms),
            normal_tick_ms: env_parse("TASKQ_NORMAL_TICK_MS", defaults.normal_tick_ms),
            delayable_tick_ms: env_parse("TASKQ_DELAYABLE_TICK_MS", defaults.delayable_tick_ms),
            utc_offset_secs: env_parse("TASKQ_UTC_OFFSET_SECS", defaults.utc_offset_secs),
            mq_log_enabled: env_flag("TASKQ_MQ_LOG", defaults.mq_log_enabled),
            cron_log_enabled: env_flag("TASKQ_CRON_LOG", defaults.cron_log_enabled),
        }
    }

    /// Reject settings that would make ticks meaningless
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.normal_key.is_empty() || self.delayable_key.is_empty() {
            return Err(QueueError::Config("store keys must not be empty".into()));
        }
        if self.normal_key == self.delayable_key {
            return Err(QueueError::Config(
                "normal and delayable keys must differ".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(QueueError::Config("batch_size must be at least 1".into()));
        }
        if self.due_lookback_secs < 0 || self.due_lookahead_secs < 0 {
            return Err(QueueError::Config("due window bounds must be >= 0".into()));
        }
        if FixedOffset::east_opt(self.utc_offset_secs).is_none() {
            return Err(QueueError::Config(format!(
                "utc offset out of range: {}s",
                self.utc_offset_secs
            )));
        }
        Ok(())
    }

    /// Time zone for `runAt` text. Out-of-range offsets fall back to UTC.
    pub fn zone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }

    pub fn poll_pacing(&self) -> Duration {
        Duration::from_millis(self.poll_pacing_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn normal_tick(&self) -> Duration {
        Duration::from_millis(self.normal_tick_ms.max(1))
    }

    pub fn delayable_tick(&self) -> Duration {
        Duration::from_millis(self.delayable_tick_ms.max(1))
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
