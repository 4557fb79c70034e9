//! cadence-send - Background daemon for scheduled publishing
//!
//! Runs the publish pass at a fixed interval and expands weekly and
//! monthly schedules once a day.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use libcadence::logging::{LogFormat, LoggingConfig};
use libcadence::{CadenceError, CadenceService, Config};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cadence-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing")]
#[command(long_about = "\
cadence-send - Background daemon for scheduled publishing

DESCRIPTION:
    cadence-send is a long-running daemon that publishes scheduled posts
    when they fall due and turns weekly and monthly schedules into posts
    once a day.

    Every poll it selects the posts that are scheduled, due and approved
    (when approval is required), publishes each one to all of its
    platforms, and records the per-platform results. A post that fails on
    every platform is retried after `retry_delay` seconds until its retry
    budget is spent.

USAGE:
    # Run in foreground (logs to stderr)
    cadence-send

    # Run with custom poll interval
    cadence-send --poll-interval 30

    # Publish due posts once and exit
    cadence-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current pass)

CONFIGURATION:
    Configuration file: ~/.config/cadence/config.toml
    Database location: ~/.local/share/cadence/cadence.db

    [scheduling]
    poll_interval = 60   # seconds between publish passes
    retry_delay = 300    # seconds before a failed post is retried
    max_retries = 3      # retry budget of new posts
    daily_run_hour = 0   # UTC hour of weekly/monthly expansion

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to check for due posts (default: 60)")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Log output format: text, json or pretty
    #[arg(long, value_name = "FORMAT", env = "CADENCE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Path to the configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run a single publish pass and exit
    #[arg(long)]
    once: bool,

    /// With --once, expand weekly and monthly schedules before publishing
    #[arg(long, requires = "once")]
    expand: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env(cli.verbose);
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.init();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(e: &anyhow::Error) -> i32 {
    e.downcast_ref::<CadenceError>()
        .map(CadenceError::exit_code)
        .unwrap_or(1)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    if let Some(seconds) = cli.poll_interval {
        if seconds == 0 {
            return Err(CadenceError::Validation(
                "Poll interval must be at least 1 second".to_string(),
            )
            .into());
        }
        config.scheduling.poll_interval = seconds;
    }

    info!("cadence-send daemon starting");
    info!("Poll interval: {}s", config.scheduling.poll_interval);

    let service = CadenceService::from_config(config).await?;

    if cli.once {
        run_once(&service, cli.expand).await?;
        info!("cadence-send: processed due posts once, exiting");
        return Ok(());
    }

    let mut scheduler = service.scheduler();
    scheduler.start();
    wait_for_shutdown().await?;

    info!("Received shutdown signal, stopping gracefully...");
    scheduler.stop().await;
    info!("cadence-send daemon stopped");
    Ok(())
}

async fn run_once(service: &CadenceService, expand: bool) -> anyhow::Result<()> {
    let ctx = service.scheduler_context();

    if expand {
        let now = Utc::now();
        let weekly = ctx.run_weekly_expansion(now).await?;
        let monthly = ctx.run_monthly_expansion(now).await?;
        info!(
            "Expansion created {} weekly and {} monthly post(s)",
            weekly.created, monthly.created
        );
    }

    let report = ctx.run_publish_pass(Utc::now()).await?;
    if report.errors > 0 {
        tracing::warn!("{} post(s) could not be processed", report.errors);
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> anyhow::Result<()> {
    use futures::StreamExt;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook_tokio::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Signal setup failed")?;
    let handle = signals.handle();
    signals.next().await;
    handle.close();
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Signal setup failed")
}
