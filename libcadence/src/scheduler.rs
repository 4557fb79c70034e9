//! Scheduler loop
//!
//! A [`Scheduler`] owns three supervised background jobs:
//!
//! - the publish pass, run every `poll_interval`, which publishes every
//!   eligible Post that is due;
//! - the weekly expansion, run once a day at `daily_run_hour` UTC;
//! - the monthly expansion, on the same daily trigger.
//!
//! Passes never overlap: each job runs its work inline and only then waits
//! for the next tick. All coordination between passes, and between the
//! scheduler and manual publishing, goes through the store. Before a Post
//! is fanned out its publish lease is claimed, so a Post is never handed to
//! the publisher twice at the same time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SchedulingConfig;
use crate::db::Database;
use crate::error::Result;
use crate::expander::{ExpansionReport, RecurrenceExpander};
use crate::gate;
use crate::lifecycle::{apply_scheduled_outcome, Outcome};
use crate::publisher::Publisher;
use crate::scheduling::next_daily_run;

/// Pause before a panicked job is restarted
const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Timers and retry bookkeeping, see [`SchedulingConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub poll_interval: Duration,
    /// Seconds a Post waits after a pass in which every platform failed
    pub retry_delay: i64,
    /// Seconds after which a stale publish lease may be taken over
    pub publish_lease: i64,
    pub daily_run_hour: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from(&SchedulingConfig::default())
    }
}

impl From<&SchedulingConfig> for SchedulerSettings {
    fn from(config: &SchedulingConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            retry_delay: config.retry_delay,
            publish_lease: config.publish_lease,
            daily_run_hour: config.daily_run_hour,
        }
    }
}

/// Counters of one publish pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Posts selected as due
    pub due: usize,
    pub posted: usize,
    /// Posts rescheduled after every platform failed
    pub retrying: usize,
    /// Posts that exhausted their retry budget in this pass
    pub failed: usize,
    /// Posts leased by someone else, or no longer eligible once claimed
    pub skipped: usize,
    /// Posts whose processing errored or panicked
    pub errors: usize,
}

/// Everything a pass needs, cheap to clone into spawned tasks
#[derive(Clone)]
pub struct SchedulerContext {
    db: Database,
    publisher: Arc<Publisher>,
    expander: Arc<RecurrenceExpander>,
    settings: SchedulerSettings,
}

impl SchedulerContext {
    pub fn new(
        db: Database,
        publisher: Arc<Publisher>,
        expander: Arc<RecurrenceExpander>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            db,
            publisher,
            expander,
            settings,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Publish every Post that is eligible at `now`.
    ///
    /// Each Post is processed in its own task; an error or panic while
    /// processing one Post is counted in the report and does not affect the
    /// others. Fails only if the due Posts cannot be selected.
    pub async fn run_publish_pass(&self, now: DateTime<Utc>) -> Result<PassReport> {
        let due = self
            .db
            .due_posts(now.timestamp(), self.settings.publish_lease)
            .await?;

        let mut report = PassReport {
            due: due.len(),
            ..Default::default()
        };
        if due.is_empty() {
            return Ok(report);
        }

        info!("Found {} post(s) due for publishing", due.len());

        let mut tasks = JoinSet::new();
        for post in due {
            let ctx = self.clone();
            tasks.spawn(async move {
                let result = publish_due_post(&ctx, &post.id, now).await;
                (post.id, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Some(Outcome::Posted)))) => report.posted += 1,
                Ok((_, Ok(Some(Outcome::Retrying)))) => report.retrying += 1,
                Ok((_, Ok(Some(Outcome::Failed)))) => report.failed += 1,
                Ok((_, Ok(None))) => report.skipped += 1,
                Ok((post_id, Err(e))) => {
                    error!("Processing post {} failed: {}", post_id, e);
                    report.errors += 1;
                }
                Err(e) => {
                    error!("Post task aborted: {}", e);
                    report.errors += 1;
                }
            }
        }

        info!(
            "Publish pass done: {} posted, {} retrying, {} failed, {} skipped, {} errors",
            report.posted, report.retrying, report.failed, report.skipped, report.errors
        );
        Ok(report)
    }

    pub async fn run_weekly_expansion(&self, now: DateTime<Utc>) -> Result<ExpansionReport> {
        self.expander.expand_weekly(now).await
    }

    pub async fn run_monthly_expansion(&self, now: DateTime<Utc>) -> Result<ExpansionReport> {
        self.expander.expand_monthly(now).await
    }
}

/// Claim, publish and record one Post.
///
/// Returns `None` when the lease is held elsewhere or the Post stopped
/// being eligible between selection and claim.
async fn publish_due_post(
    ctx: &SchedulerContext,
    post_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Outcome>> {
    let at = now.timestamp();
    if !ctx.db.claim_post(post_id, at, ctx.settings.publish_lease).await? {
        debug!("Post {} is leased by another publisher, skipping", post_id);
        return Ok(None);
    }

    let mut post = match ctx.db.get_post(post_id).await? {
        Some(post) if gate::is_eligible(&post, at) => post,
        _ => {
            debug!("Post {} is no longer eligible, releasing", post_id);
            ctx.db.release_lease(post_id).await?;
            return Ok(None);
        }
    };

    let results = ctx
        .publisher
        .publish(&post.owner, &post.content, &post.platforms, post.image.as_ref())
        .await;

    let outcome = apply_scheduled_outcome(&mut post, results, at, ctx.settings.retry_delay);
    match outcome {
        Outcome::Posted => info!(
            "Post {} published to {}/{} platform(s)",
            post.id,
            post.successes(),
            post.platforms.len()
        ),
        Outcome::Retrying => warn!(
            "Post {} failed on every platform, retry {}/{} scheduled",
            post.id, post.retry_count, post.max_retries
        ),
        Outcome::Failed => error!(
            "Post {} failed on every platform after {} retries, giving up",
            post.id, post.retry_count
        ),
    }

    // A failed write keeps the lease until it expires, so the Post is not
    // republished before the outcome is known.
    ctx.db.complete_publish(&post).await?;
    Ok(Some(outcome))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Publish,
    WeeklyExpansion,
    MonthlyExpansion,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Job::Publish => "publish",
            Job::WeeklyExpansion => "weekly expansion",
            Job::MonthlyExpansion => "monthly expansion",
        })
    }
}

impl Job {
    async fn run(self, ctx: SchedulerContext, shutdown: watch::Receiver<bool>) {
        match self {
            Job::Publish => publish_loop(ctx, shutdown).await,
            Job::WeeklyExpansion | Job::MonthlyExpansion => daily_loop(self, ctx, shutdown).await,
        }
    }
}

async fn publish_loop(ctx: SchedulerContext, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(ctx.settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        if let Err(e) = ctx.run_publish_pass(Utc::now()).await {
            error!("Publish pass failed: {}", e);
        }
    }
}

async fn daily_loop(job: Job, ctx: SchedulerContext, mut shutdown: watch::Receiver<bool>) {
    loop {
        let now = Utc::now();
        let next = next_daily_run(now, ctx.settings.daily_run_hour);
        let wait = (next - now).to_std().unwrap_or_default();
        debug!("Next {} at {}", job, next);

        tokio::select! {
            _ = sleep(wait) => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        let now = Utc::now();
        let report = match job {
            Job::MonthlyExpansion => ctx.run_monthly_expansion(now).await,
            _ => ctx.run_weekly_expansion(now).await,
        };
        match report {
            Ok(report) => info!(
                "{} done: {} created, {} skipped, {} errors",
                job, report.created, report.skipped, report.errors
            ),
            Err(e) => error!("{} failed: {}", job, e),
        }
    }
}

/// Run `job` until shutdown, restarting it if it panics
async fn supervise(job: Job, ctx: SchedulerContext, shutdown: watch::Receiver<bool>) {
    loop {
        let run = tokio::spawn(job.run(ctx.clone(), shutdown.clone()));
        match run.await {
            Ok(()) => break,
            Err(e) if e.is_panic() => {
                if *shutdown.borrow() {
                    break;
                }
                error!("The {} job panicked, restarting: {}", job, e);
                sleep(RESTART_DELAY).await;
            }
            Err(_) => break,
        }
    }
    debug!("The {} job stopped", job);
}

enum State {
    Stopped,
    Running {
        shutdown: watch::Sender<bool>,
        jobs: JoinSet<()>,
    },
}

/// Lifecycle of the background jobs
pub struct Scheduler {
    ctx: SchedulerContext,
    state: State,
}

impl Scheduler {
    pub fn new(ctx: SchedulerContext) -> Self {
        Self {
            ctx,
            state: State::Stopped,
        }
    }

    pub fn context(&self) -> &SchedulerContext {
        &self.ctx
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    /// Spawn the publish and expansion jobs on the current runtime.
    ///
    /// Returns `false`, doing nothing, if the scheduler is already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            debug!("Scheduler already running");
            return false;
        }

        let (shutdown, receiver) = watch::channel(false);
        let mut jobs = JoinSet::new();
        for job in [Job::Publish, Job::WeeklyExpansion, Job::MonthlyExpansion] {
            jobs.spawn(supervise(job, self.ctx.clone(), receiver.clone()));
        }

        info!(
            "Scheduler started (poll interval {}s, daily run at {:02}:00 UTC)",
            self.ctx.settings.poll_interval.as_secs(),
            self.ctx.settings.daily_run_hour
        );
        self.state = State::Running { shutdown, jobs };
        true
    }

    /// Signal shutdown and wait for in-flight passes to finish
    pub async fn stop(&mut self) {
        let State::Running { shutdown, mut jobs } = std::mem::replace(&mut self.state, State::Stopped)
        else {
            return;
        };

        let _ = shutdown.send(true);
        while let Some(joined) = jobs.join_next().await {
            if let Err(e) = joined {
                warn!("Scheduler job ended abnormally: {}", e);
            }
        }
        info!("Scheduler stopped");
    }
}
