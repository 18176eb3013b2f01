//! Inspect command - list pending delayable tasks
//!
//! Usage:
//!   taskq inspect          # entries the next scan would claim
//!   taskq inspect --all    # every entry in the delayable set

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use taskq::{QueuePayload, QueueStore};

use super::{open_store, queue_config};

#[derive(Args)]
pub struct InspectArgs {
    /// Show the whole set instead of the due window
    #[arg(long, short = 'a')]
    pub all: bool,

    /// Print raw payloads
    #[arg(long)]
    pub raw: bool,
}

/// Score range the next delayable scan reads
fn due_window(now_secs: i64, lookback_secs: i64, lookahead_secs: i64) -> (i64, i64) {
    (
        now_secs.saturating_sub(lookback_secs),
        now_secs.saturating_add(lookahead_secs),
    )
}

pub async fn run(args: InspectArgs, redis_url: &str) -> Result<()> {
    let config = queue_config()?;
    let store = open_store(redis_url)?;

    let (min, max) = if args.all {
        (i64::MIN, i64::MAX)
    } else {
        due_window(
            chrono::Utc::now().timestamp(),
            config.due_lookback_secs,
            config.due_lookahead_secs,
        )
    };

    let entries = store
        .range_by_score(&config.delayable_key, min, max)
        .await
        .with_context(|| format!("Failed to read {}", config.delayable_key))?;

    println!("{}", format!("Delayable tasks in {}", config.delayable_key).bold().cyan());
    println!("{}", "═".repeat(40).cyan());

    if entries.is_empty() {
        println!("{}", "No pending tasks".dimmed());
        return Ok(());
    }

    if args.raw {
        for raw in &entries {
            println!("{raw}");
        }
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Task").fg(Color::Cyan),
            Cell::new("Run At").fg(Color::Cyan),
            Cell::new("Retries").fg(Color::Cyan),
            Cell::new("Params").fg(Color::Cyan),
        ]);

    for raw in &entries {
        match QueuePayload::from_json(raw) {
            Ok(payload) => {
                let retries = match (payload.fail_times, payload.retry_attempts) {
                    (Some(fail), Some(attempts)) => format!("{fail}/{attempts}"),
                    (None, Some(attempts)) => format!("0/{attempts}"),
                    _ => "-".to_string(),
                };
                let params = payload
                    .task_params
                    .as_ref()
                    .map(|p| serde_json::Value::Object(p.clone()).to_string())
                    .unwrap_or_else(|| "-".to_string());
                table.add_row(vec![
                    Cell::new(&payload.task_name),
                    Cell::new(payload.run_at.as_deref().unwrap_or("-")),
                    Cell::new(retries),
                    Cell::new(params),
                ]);
            }
            Err(_) => {
                table.add_row(vec![
                    Cell::new("<malformed>").fg(Color::Red),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new(raw),
                ]);
            }
        }
    }

    println!("{table}");
    println!("{} {}", "Total:".dimmed(), entries.len());
    Ok(())
}
