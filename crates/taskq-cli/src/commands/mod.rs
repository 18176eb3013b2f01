//! CLI command implementations

pub mod info;
pub mod inspect;
pub mod publish;

use anyhow::{Context, Result};
use taskq::QueueConfig;
use taskq_redis::{RedisConfig, RedisStore};

/// Queue settings from the environment, checked before use
pub fn queue_config() -> Result<QueueConfig> {
    let config = QueueConfig::from_env();
    config.validate().context("Invalid TASKQ_* configuration")?;
    Ok(config)
}

pub fn open_store(redis_url: &str) -> Result<RedisStore> {
    let config = RedisConfig {
        url: redis_url.to_string(),
        ..RedisConfig::from_env()
    };
    RedisStore::open(&config).with_context(|| format!("Failed to open Redis at {redis_url}"))
}
