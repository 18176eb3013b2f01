//! taskq CLI - publish and inspect queued tasks
//!
//! # Usage
//!
//! ```bash
//! # Publish a normal task
//! taskq publish sendEmail --params '{"to": "ops@example.com"}'
//!
//! # Publish a task due in 10 minutes, retried twice at 30s intervals
//! taskq publish report --delay 10 --unit m --retry-attempts 2 --retry-interval-ms 30000
//!
//! # List pending delayable tasks
//! taskq inspect --all
//!
//! # Show resolved configuration
//! taskq info
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

use commands::{info, inspect, publish};

/// taskq - store-backed task queue
#[derive(Parser)]
#[command(
    name = "taskq",
    version,
    about = "taskq CLI - publish and inspect queued tasks",
    long_about = "Publishes normal and delayable tasks to a Redis-backed taskq queue\n\
                  and inspects the delayable set. Queue keys and time zone come from\n\
                  TASKQ_* environment variables."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Redis URL
    #[arg(long, env = "REDIS_URL", global = true, default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a task by name
    #[command(name = "publish")]
    Publish(publish::PublishArgs),

    /// List delayable tasks
    #[command(name = "inspect")]
    Inspect(inspect::InspectArgs),

    /// Show resolved configuration
    #[command(name = "info")]
    Info(info::InfoArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Publish(args) => publish::run(args, &cli.redis_url).await,
        Commands::Inspect(args) => inspect::run(args, &cli.redis_url).await,
        Commands::Info(args) => info::run(args, &cli.redis_url),
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

/// Print a success message with a checkmark
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an info message
pub fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}
