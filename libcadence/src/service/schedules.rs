//! Schedule creation and management
//!
//! Entry points that produce Schedules:
//!
//! - `today`: one Post for a given time, generated immediately and held
//!   for review unless the caller opts out
//! - `weekly`: a topic per weekday, materialised daily by the expander
//! - `monthly`: a generated plan of up to 30 dated topics, materialised
//!   daily by the expander

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{CadenceError, GenerationError, Result};
use crate::gate::EntryPoint;
use crate::generator::{GenerationRequest, Generators, ImageStyle, PlanRequest};
use crate::plan::parse_monthly_plan;
use crate::types::{
    ContentGoal, Distribution, ImageBundle, MonthlyConfig, Platform, Post, Schedule, ScheduleKind,
    unique_platforms, Tone, WeeklyConfig,
};

/// Request for a single post
#[derive(Debug, Clone)]
pub struct TodayRequest {
    pub topic: String,
    pub explanation: String,
    pub tone: Tone,
    pub platforms: Vec<Platform>,
    pub post_time: DateTime<Utc>,
    /// Hold the post for review; defaults to `true`
    pub requires_approval: Option<bool>,
    pub generate_image: bool,
}

/// Post and schedule created by [`ScheduleService::create_today`]
#[derive(Debug, Clone)]
pub struct TodayResponse {
    pub post: Post,
    pub schedule: Schedule,
}

/// Request for a generated monthly plan
#[derive(Debug, Clone)]
pub struct MonthlyRequest {
    pub industry: String,
    pub target_audience: String,
    pub content_goal: ContentGoal,
    pub distribution: Distribution,
}

#[derive(Clone)]
pub struct ScheduleService {
    db: Database,
    generators: Generators,
    max_retries: u32,
}

impl ScheduleService {
    pub fn new(db: Database, generators: Generators, max_retries: u32) -> Self {
        Self {
            db,
            generators,
            max_retries,
        }
    }

    pub async fn get(&self, owner: &str, schedule_id: &str) -> Result<Schedule> {
        self.db
            .get_schedule_for_owner(owner, schedule_id)
            .await?
            .ok_or_else(|| CadenceError::NotFound(format!("Schedule {}", schedule_id)))
    }

    pub async fn list(&self, owner: &str) -> Result<Vec<Schedule>> {
        self.db.list_schedules(owner).await
    }

    /// Flip a schedule's active flag. Inactive schedules are ignored by the expander.
    ///
    /// # Errors
    ///
    /// `CadenceError::NotFound` for unknown or foreign schedules.
    pub async fn toggle_active(&self, owner: &str, schedule_id: &str) -> Result<Schedule> {
        let mut schedule = self.get(owner, schedule_id).await?;
        let now = Utc::now().timestamp();

        if !self
            .db
            .set_schedule_active(&schedule.id, !schedule.is_active, now)
            .await?
        {
            return Err(CadenceError::NotFound(format!("Schedule {}", schedule_id)));
        }

        schedule.is_active = !schedule.is_active;
        schedule.updated_at = now;
        info!(
            "Schedule {} is now {}",
            schedule.id,
            if schedule.is_active { "active" } else { "inactive" }
        );
        Ok(schedule)
    }

    /// Generate a post for `request.post_time` and store it with a `today`
    /// schedule owning it.
    ///
    /// A failed image generation is logged and the post is created without
    /// an image.
    ///
    /// # Errors
    ///
    /// `CadenceError::Validation` for a blank topic or explanation, or an
    /// empty platform list.
    pub async fn create_today(&self, owner: &str, request: TodayRequest) -> Result<TodayResponse> {
        let topic = request.topic.trim();
        if topic.is_empty() {
            return Err(CadenceError::Validation("Topic cannot be empty".to_string()));
        }
        if request.explanation.trim().is_empty() {
            return Err(CadenceError::Validation(
                "Explanation cannot be empty".to_string(),
            ));
        }
        if request.platforms.is_empty() {
            return Err(CadenceError::Validation(
                "At least one platform is required".to_string(),
            ));
        }

        let platforms = unique_platforms(request.platforms);

        let content = self
            .generators
            .content
            .generate_for_platforms(&GenerationRequest {
                topic: topic.to_string(),
                explanation: request.explanation.clone(),
                tone: request.tone,
                platforms: platforms.clone(),
            })
            .await;

        let image = if request.generate_image {
            self.generate_image(topic, &request.explanation).await
        } else {
            None
        };

        let requires_approval = request
            .requires_approval
            .unwrap_or_else(|| EntryPoint::Today.default_requires_approval());

        let mut post = Post::new(owner, topic, request.explanation);
        post.tone = request.tone;
        post.content = content;
        post.image = image;
        post.platforms = platforms;
        post.requires_approval = requires_approval;
        post.status = EntryPoint::initial_status(requires_approval);
        post.scheduled_time = Some(request.post_time.timestamp());
        post.max_retries = self.max_retries;

        let mut schedule = Schedule::new(owner, ScheduleKind::Today);
        schedule.post_ids = vec![post.id.clone()];
        schedule.next_run_date = Some(request.post_time.timestamp());

        self.db
            .create_schedule_with_posts(&schedule, std::slice::from_ref(&post))
            .await?;

        info!(
            "Created post {} for {} ({})",
            post.id, request.post_time, post.status
        );
        Ok(TodayResponse { post, schedule })
    }

    async fn generate_image(&self, topic: &str, explanation: &str) -> Option<ImageBundle> {
        let Some(images) = &self.generators.images else {
            warn!("Image requested but no image generator is configured");
            return None;
        };

        let style = ImageStyle::detect(topic, explanation);
        let prompt = style.prompt(topic, explanation);
        match images.generate(&prompt).await {
            Ok(generated) => {
                let variants = images.make_variants(&generated.url).await;
                Some(ImageBundle {
                    url: generated.url,
                    prompt: Some(generated.prompt),
                    style: Some(style.as_str().to_string()),
                    variants,
                })
            }
            Err(e) => {
                warn!("Image generation failed, continuing without image: {}", e);
                None
            }
        }
    }

    /// Store a weekly schedule. Posts are created by the daily expansion.
    ///
    /// # Errors
    ///
    /// `CadenceError::Validation` unless at least one day names a topic.
    pub async fn create_weekly(&self, owner: &str, mut config: WeeklyConfig) -> Result<Schedule> {
        for day in config.days.values_mut() {
            day.platforms = unique_platforms(day.platforms.drain(..));
        }
        if !config.days.values().any(|day| !day.topic.trim().is_empty()) {
            return Err(CadenceError::Validation(
                "At least one day must have a topic".to_string(),
            ));
        }

        let schedule = Schedule::new(owner, ScheduleKind::Weekly(config));
        self.db.create_schedule(&schedule).await?;

        info!("Created weekly schedule {}", schedule.id);
        Ok(schedule)
    }

    /// Generate a monthly plan and store it as a monthly schedule.
    ///
    /// # Errors
    ///
    /// - `CadenceError::Validation` for a blank industry or audience, or a
    ///   distribution not summing to 100
    /// - `CadenceError::Generation` if no plan could be generated or the
    ///   generated plan holds no usable topic
    pub async fn create_monthly(&self, owner: &str, request: MonthlyRequest) -> Result<Schedule> {
        if request.industry.trim().is_empty() || request.target_audience.trim().is_empty() {
            return Err(CadenceError::Validation(
                "Industry and target audience are required".to_string(),
            ));
        }
        if request.distribution.total() != 100 {
            return Err(CadenceError::Validation(format!(
                "Content distribution must total 100%, got {}%",
                request.distribution.total()
            )));
        }

        let text = self
            .generators
            .content
            .plan_month(&PlanRequest {
                industry: request.industry.clone(),
                target_audience: request.target_audience.clone(),
                content_goal: request.content_goal,
                distribution: request.distribution,
            })
            .await?;

        let topics = parse_monthly_plan(&text);
        if topics.is_empty() {
            return Err(GenerationError::Response(
                "generated plan contains no topics".to_string(),
            )
            .into());
        }

        let schedule = Schedule::new(
            owner,
            ScheduleKind::Monthly(MonthlyConfig {
                industry: request.industry,
                target_audience: request.target_audience,
                content_goal: request.content_goal,
                distribution: request.distribution,
                topics,
            }),
        );
        self.db.create_schedule(&schedule).await?;

        info!("Created monthly schedule {}", schedule.id);
        Ok(schedule)
    }
}
