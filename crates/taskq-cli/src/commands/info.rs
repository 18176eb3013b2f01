//! Info command - show version and resolved configuration

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::queue_config;

#[derive(Args)]
pub struct InfoArgs {
    /// Print configuration as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: InfoArgs, redis_url: &str) -> Result<()> {
    let config = queue_config()?;

    if args.json {
        let mut value = serde_json::to_value(&config)?;
        if let Some(map) = value.as_object_mut() {
            map.insert("redis_url".into(), redis_url.into());
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", "taskq".bold().cyan());
    println!("{}", "═".repeat(40).cyan());
    println!();

    println!("  {} {}", "Version:".bold(), env!("CARGO_PKG_VERSION"));
    println!("  {} {}", "Redis:".bold(), redis_url);
    println!("  {} {}", "Time zone:".bold(), config.zone());
    println!();

    println!("{}", "Queues".bold());
    println!("  {} {}", "Normal list:".dimmed(), config.normal_key);
    println!("  {} {}", "Delayable set:".dimmed(), config.delayable_key);
    println!();

    println!("{}", "Polling".bold());
    println!(
        "  {} {} tasks, {}ms apart, every {}ms",
        "Normal:".dimmed(),
        config.batch_size,
        config.poll_pacing_ms,
        config.normal_tick_ms
    );
    println!(
        "  {} due within [-{}s, +{}s], every {}ms, {}ms acquire timeout",
        "Delayable:".dimmed(),
        config.due_lookback_secs,
        config.due_lookahead_secs,
        config.delayable_tick_ms,
        config.acquire_timeout_ms
    );
    println!();

    let flag = |on: bool| if on { "on".green() } else { "off".dimmed() };
    println!("{}", "Logging".bold());
    println!("  {} {}", "Queue log:".dimmed(), flag(config.mq_log_enabled));
    println!("  {} {}", "Cron log:".dimmed(), flag(config.cron_log_enabled));

    Ok(())
}
