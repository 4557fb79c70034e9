//! cadence-queue - Review, publish and schedule posts
//!
//! Operator tool for the manual side of Cadence: approving generated
//! posts, publishing them on demand, and creating schedules.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use libcadence::lifecycle::Outcome;
use libcadence::logging::{LogFormat, LoggingConfig};
use libcadence::scheduling::parse_post_time;
use libcadence::service::{MonthlyRequest, TodayRequest};
use libcadence::types::{
    resolve_image, ContentGoal, DayOfWeek, DayTemplate, Distribution, WeeklyConfig,
};
use libcadence::{CadenceError, CadenceService, Config, Platform, Post, PostStatus, Schedule, ScheduleKind, Tone};

#[derive(Parser, Debug)]
#[command(name = "cadence-queue")]
#[command(version)]
#[command(about = "Review, publish and schedule posts")]
#[command(long_about = "\
cadence-queue - Review, publish and schedule posts

DESCRIPTION:
    cadence-queue manages the posts and schedules that cadence-send
    publishes. Single posts created with `today` wait for approval before
    the daemon will publish them; weekly and monthly schedules produce
    posts that publish without review.

COMMANDS:
    list        List posts
    show        Show one post with its per-platform results
    approve     Approve a post held for review
    publish     Publish a post immediately
    schedules   List schedules
    toggle      Pause or resume a schedule
    today       Generate a single post for a given time
    weekly      Create a weekly schedule from a JSON file
    monthly     Generate a monthly plan and schedule it

USAGE EXAMPLES:
    # Posts waiting for review
    cadence-queue list --status pending_review

    # Approve with an edited LinkedIn text
    cadence-queue approve <POST_ID> --edit \"linkedin=Reworded intro\"

    # A post for tomorrow afternoon, on two platforms
    cadence-queue today --topic \"Release 2.0\" --explanation \"What is new\" \\
        --platform linkedin --platform twitter --at \"tomorrow 3pm\"

    # Weekly schedule: {\"monday\": {\"topic\": \"...\", \"platforms\": [\"linkedin\"]}}
    cadence-queue weekly week.json

CONFIGURATION:
    Configuration file: ~/.config/cadence/config.toml
    Database location: ~/.local/share/cadence/cadence.db

    Override with environment variables:
        CADENCE_CONFIG    - Path to config file
        CADENCE_DB_PATH   - Path to database file
        CADENCE_OWNER     - Owner to act as

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Configuration error
    3 - Invalid input
    4 - Post or schedule not found
    5 - Operation not allowed in the current state
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Owner to act as (defaults to [defaults] owner in the config)
    #[arg(long, global = true, env = "CADENCE_OWNER")]
    owner: Option<String>,

    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List posts, newest first
    List {
        /// Only posts with this status
        #[arg(short, long)]
        status: Option<PostStatus>,

        /// Maximum number of posts
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show a post
    Show {
        post_id: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Approve a post held for review
    Approve {
        post_id: String,

        /// Replace one platform's text, as PLATFORM=TEXT (repeatable)
        #[arg(long = "edit", value_name = "PLATFORM=TEXT", value_parser = parse_edit)]
        edits: Vec<(Platform, String)>,
    },

    /// Publish a post now, outside its schedule
    Publish { post_id: String },

    /// List schedules
    Schedules {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Pause an active schedule or resume a paused one
    Toggle { schedule_id: String },

    /// Generate one post for a given time
    Today {
        #[arg(long)]
        topic: String,

        #[arg(long)]
        explanation: String,

        #[arg(long, default_value = "professional")]
        tone: Tone,

        /// Target platform (repeatable; defaults to [defaults] platforms)
        #[arg(short, long = "platform")]
        platforms: Vec<Platform>,

        /// When to publish, e.g. "2025-11-20T15:00:00Z", "+2h", "tomorrow 3pm"
        #[arg(long, value_name = "TIME")]
        at: Option<String>,

        /// Schedule without waiting for approval
        #[arg(long)]
        no_review: bool,

        /// Generate an image for the post
        #[arg(long)]
        image: bool,
    },

    /// Create a weekly schedule from a JSON day mapping
    Weekly {
        /// JSON file mapping weekday names to {topic, explanation, platforms}
        file: PathBuf,
    },

    /// Generate a monthly plan and schedule it
    Monthly {
        #[arg(long)]
        industry: String,

        #[arg(long)]
        audience: String,

        #[arg(long, default_value = "branding")]
        goal: ContentGoal,

        /// Share of educational posts, in percent
        #[arg(long, default_value_t = 60)]
        educational: u8,

        /// Share of engagement posts, in percent
        #[arg(long, default_value_t = 25)]
        engagement: u8,

        /// Share of promotional posts, in percent
        #[arg(long, default_value_t = 15)]
        promotional: u8,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "error" };
    LoggingConfig::new(LogFormat::Text, level, cli.verbose).init();

    if let Err(e) = run(cli).await {
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
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let owner = cli
        .owner
        .clone()
        .unwrap_or_else(|| config.defaults.owner.clone());
    let default_platforms = config.defaults.platforms.clone();

    let service = CadenceService::from_config(config).await?;

    match cli.command {
        Commands::List {
            status,
            limit,
            format,
        } => {
            let posts = service.posts().list(&owner, status, Some(limit)).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&posts)?),
                OutputFormat::Text => posts.iter().for_each(print_post_line),
            }
        }
        Commands::Show { post_id, format } => {
            let post = service.posts().get(&owner, &post_id).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&post)?),
                OutputFormat::Text => print_post(&post),
            }
        }
        Commands::Approve { post_id, edits } => {
            let edits: BTreeMap<Platform, String> = edits.into_iter().collect();
            let edits = if edits.is_empty() { None } else { Some(edits) };
            let post = service.posts().approve(&owner, &post_id, edits).await?;
            println!("Post {} approved ({})", post.id, post.status);
        }
        Commands::Publish { post_id } => {
            let response = service.posts().publish_now(&owner, &post_id).await?;
            print_results(&response.post);
            if response.outcome != Outcome::Posted {
                anyhow::bail!("Post {} failed on every platform", response.post.id);
            }
        }
        Commands::Schedules { format } => {
            let schedules = service.schedules().list(&owner).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&schedules)?),
                OutputFormat::Text => schedules.iter().for_each(print_schedule_line),
            }
        }
        Commands::Toggle { schedule_id } => {
            let schedule = service
                .schedules()
                .toggle_active(&owner, &schedule_id)
                .await?;
            println!(
                "Schedule {} {}",
                schedule.id,
                if schedule.is_active { "resumed" } else { "paused" }
            );
        }
        Commands::Today {
            topic,
            explanation,
            tone,
            platforms,
            at,
            no_review,
            image,
        } => {
            let now = Utc::now();
            let post_time = match at {
                Some(at) => parse_post_time(&at, now)?,
                None => now,
            };
            let platforms = if platforms.is_empty() {
                default_platforms
            } else {
                platforms
            };

            let created = service
                .schedules()
                .create_today(
                    &owner,
                    TodayRequest {
                        topic,
                        explanation,
                        tone,
                        platforms,
                        post_time,
                        requires_approval: no_review.then_some(false),
                        generate_image: image,
                    },
                )
                .await?;
            println!("{}", created.post.id);
            eprintln!(
                "Post {} is {} for {}",
                created.post.id,
                created.post.status,
                format_time(created.post.scheduled_time)
            );
        }
        Commands::Weekly { file } => {
            let config = read_weekly_config(&file)?;
            let schedule = service.schedules().create_weekly(&owner, config).await?;
            println!("{}", schedule.id);
        }
        Commands::Monthly {
            industry,
            audience,
            goal,
            educational,
            engagement,
            promotional,
        } => {
            let schedule = service
                .schedules()
                .create_monthly(
                    &owner,
                    MonthlyRequest {
                        industry,
                        target_audience: audience,
                        content_goal: goal,
                        distribution: Distribution {
                            educational,
                            engagement,
                            promotional,
                        },
                    },
                )
                .await?;
            println!("{}", schedule.id);
            if let ScheduleKind::Monthly(config) = &schedule.kind {
                eprintln!("Planned {} topic(s)", config.topics.len());
            }
        }
    }

    Ok(())
}

fn parse_edit(input: &str) -> Result<(Platform, String), String> {
    let (platform, text) = input
        .split_once('=')
        .ok_or_else(|| format!("expected PLATFORM=TEXT, got '{}'", input))?;
    let platform = platform.trim().parse::<Platform>().map_err(|e| e.to_string())?;
    Ok((platform, text.to_string()))
}

/// Read a weekday mapping, either bare or wrapped in `{"days": ...}`
fn read_weekly_config(path: &Path) -> libcadence::Result<WeeklyConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CadenceError::Validation(format!("Cannot read {}: {}", path.display(), e))
    })?;

    if let Ok(config) = serde_json::from_str::<WeeklyConfig>(&text) {
        if !config.days.is_empty() {
            return Ok(config);
        }
    }
    let days: BTreeMap<DayOfWeek, DayTemplate> = serde_json::from_str(&text).map_err(|e| {
        CadenceError::Validation(format!("Invalid weekly schedule {}: {}", path.display(), e))
    })?;
    Ok(WeeklyConfig { days })
}

fn format_time(timestamp: Option<i64>) -> String {
    timestamp
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

fn print_post_line(post: &Post) {
    println!(
        "{} | {} | {} | {}",
        post.id,
        post.status,
        format_time(post.scheduled_time),
        truncate(&post.topic, 50)
    );
}

fn print_post(post: &Post) {
    println!("id:        {}", post.id);
    println!("topic:     {}", post.topic);
    println!("status:    {}", post.status);
    println!("tone:      {}", post.tone);
    println!("scheduled: {}", format_time(post.scheduled_time));
    println!(
        "approval:  {}",
        match (post.requires_approval, post.is_approved) {
            (false, _) => "not required",
            (true, true) => "approved",
            (true, false) => "pending",
        }
    );
    println!("retries:   {}/{}", post.retry_count, post.max_retries);
    if let Some(image) = &post.image {
        println!("image:     {}", image.url);
    }
    for platform in &post.platforms {
        println!();
        println!("[{}]", platform);
        if let Some(url) = resolve_image(post.image.as_ref(), platform.as_str()) {
            println!("image: {}", url);
        }
        println!(
            "{}",
            post.content.get(platform).map(String::as_str).unwrap_or("(no content)")
        );
    }
    if !post.post_results.is_empty() {
        println!();
        print_results(post);
    }
}

fn print_results(post: &Post) {
    for result in &post.post_results {
        match (&result.url, &result.error) {
            (Some(url), _) => println!("{}: {} {}", result.platform, result.status.as_str(), url),
            (None, Some(error)) => {
                println!("{}: {} ({})", result.platform, result.status.as_str(), error)
            }
            (None, None) => println!("{}: {}", result.platform, result.status.as_str()),
        }
    }
}

fn print_schedule_line(schedule: &Schedule) {
    let detail = match &schedule.kind {
        ScheduleKind::Today => format!("{} post(s)", schedule.post_ids.len()),
        ScheduleKind::Weekly(config) => format!("{} day(s)", config.days.len()),
        ScheduleKind::Monthly(config) => format!("{}, {} topic(s)", config.industry, config.topics.len()),
    };
    println!(
        "{} | {} | {} | {}",
        schedule.id,
        schedule.schedule_type(),
        if schedule.is_active { "active" } else { "paused" },
        detail
    );
}
