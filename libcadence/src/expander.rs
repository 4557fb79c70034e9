//! Recurrence expansion
//!
//! Once a day, every active weekly and monthly Schedule gets a chance to
//! produce today's Post from its template. Expansion is idempotent per
//! calendar day: a Post already existing for the same owner and topic
//! within today's window turns the run into a no-op.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::Result;
use crate::gate::EntryPoint;
use crate::generator::{ContentGenerator, GenerationRequest};
use crate::scheduling::day_window;
use crate::types::{
    unique_platforms, DayOfWeek, Platform, Post, Schedule, ScheduleKind, ScheduleType, Tone,
    DEFAULT_PLATFORMS,
};

/// Counters of one expansion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionReport {
    /// Active schedules looked at
    pub examined: usize,
    /// Posts created
    pub created: usize,
    /// Schedules with no template for today, or already expanded today
    pub skipped: usize,
    /// Schedules whose expansion failed
    pub errors: usize,
}

/// Today's template of a recurring schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodaysTemplate {
    pub topic: String,
    pub explanation: String,
    pub tone: Tone,
    pub platforms: Vec<Platform>,
}

/// Resolve the template `kind` defines for the day containing `now`.
///
/// Weekly schedules are keyed by weekday and monthly ones by day of month.
/// Templates with a blank topic count as absent.
pub fn todays_template(kind: &ScheduleKind, now: DateTime<Utc>) -> Option<TodaysTemplate> {
    let template = match kind {
        ScheduleKind::Today => return None,
        ScheduleKind::Weekly(config) => {
            let day = config.days.get(&DayOfWeek::from(now.weekday()))?;
            TodaysTemplate {
                topic: day.topic.trim().to_string(),
                explanation: day.explanation.clone(),
                tone: Tone::Professional,
                platforms: day.platforms.clone(),
            }
        }
        ScheduleKind::Monthly(config) => {
            let topic = config.topics.iter().find(|t| t.day == now.day())?;
            TodaysTemplate {
                topic: topic.topic.trim().to_string(),
                explanation: topic.explanation.clone(),
                tone: topic.tone,
                platforms: topic.platforms.clone(),
            }
        }
    };

    if template.topic.is_empty() {
        return None;
    }
    Some(template)
}

pub struct RecurrenceExpander {
    db: Database,
    content: Arc<dyn ContentGenerator>,
    max_retries: u32,
}

impl RecurrenceExpander {
    pub fn new(db: Database, content: Arc<dyn ContentGenerator>, max_retries: u32) -> Self {
        Self {
            db,
            content,
            max_retries,
        }
    }

    pub async fn expand_weekly(&self, now: DateTime<Utc>) -> Result<ExpansionReport> {
        self.expand(ScheduleType::Weekly, now).await
    }

    pub async fn expand_monthly(&self, now: DateTime<Utc>) -> Result<ExpansionReport> {
        self.expand(ScheduleType::Monthly, now).await
    }

    /// Expand every active schedule of `schedule_type`.
    ///
    /// Fails only if the schedules cannot be listed; a failing schedule is
    /// logged, counted and skipped.
    async fn expand(&self, schedule_type: ScheduleType, now: DateTime<Utc>) -> Result<ExpansionReport> {
        let schedules = self.db.active_schedules(schedule_type).await?;
        let mut report = ExpansionReport {
            examined: schedules.len(),
            ..Default::default()
        };

        for schedule in &schedules {
            match self.expand_schedule(schedule, now).await {
                Ok(Some(post)) => {
                    info!(
                        "Created {} post {} for '{}' (schedule {})",
                        schedule_type, post.id, post.topic, schedule.id
                    );
                    report.created += 1;
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    warn!("Expanding {} schedule {} failed: {}", schedule_type, schedule.id, e);
                    report.errors += 1;
                }
            }
        }

        debug!("{} expansion finished: {:?}", schedule_type, report);
        Ok(report)
    }

    /// Produce today's Post for one schedule, if it has one due and none exists yet
    pub async fn expand_schedule(&self, schedule: &Schedule, now: DateTime<Utc>) -> Result<Option<Post>> {
        let Some(template) = todays_template(&schedule.kind, now) else {
            return Ok(None);
        };

        let (start, end) = day_window(now);
        if self
            .db
            .post_exists_for_topic(&schedule.owner, &template.topic, start.timestamp(), end.timestamp())
            .await?
        {
            debug!(
                "Schedule {} already has a post for '{}' today",
                schedule.id, template.topic
            );
            return Ok(None);
        }

        let platforms = if template.platforms.is_empty() {
            DEFAULT_PLATFORMS.to_vec()
        } else {
            unique_platforms(template.platforms)
        };

        let content = self
            .content
            .generate_for_platforms(&GenerationRequest {
                topic: template.topic.clone(),
                explanation: template.explanation.clone(),
                tone: template.tone,
                platforms: platforms.clone(),
            })
            .await;

        let entry = match schedule.schedule_type() {
            ScheduleType::Monthly => EntryPoint::Monthly,
            _ => EntryPoint::Weekly,
        };
        let requires_approval = entry.default_requires_approval();

        let mut post = Post::new(&schedule.owner, template.topic, template.explanation);
        post.tone = template.tone;
        post.content = content;
        post.platforms = platforms;
        post.requires_approval = requires_approval;
        post.status = EntryPoint::initial_status(requires_approval);
        post.scheduled_time = Some(now.timestamp());
        post.max_retries = self.max_retries;
        post.created_at = now.timestamp();
        post.updated_at = now.timestamp();

        self.db
            .record_expansion(&schedule.id, &post, now.timestamp())
            .await?;
        Ok(Some(post))
    }
}
