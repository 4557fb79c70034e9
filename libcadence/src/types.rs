//! Core types for Cadence

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CadenceError;

/// Default retry budget for a Post on the scheduled path
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Platforms used when a template does not name any
pub const DEFAULT_PLATFORMS: [Platform; 2] = [Platform::LinkedIn, Platform::Twitter];

// ============================================================================
// Platforms
// ============================================================================

/// The closed set of publishing targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    LinkedIn,
    Facebook,
    Twitter,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::LinkedIn,
        Platform::Facebook,
        Platform::Twitter,
        Platform::Instagram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::LinkedIn => "linkedin",
            Platform::Facebook => "facebook",
            Platform::Twitter => "twitter",
            Platform::Instagram => "instagram",
        }
    }

    /// Position in [`Platform::ALL`], used to index fixed per-platform tables
    pub fn index(&self) -> usize {
        match self {
            Platform::LinkedIn => 0,
            Platform::Facebook => 1,
            Platform::Twitter => 2,
            Platform::Instagram => 3,
        }
    }
}

/// Drop repeated platforms, keeping first-seen order
pub fn unique_platforms(platforms: impl IntoIterator<Item = Platform>) -> Vec<Platform> {
    let mut unique: Vec<Platform> = Vec::new();
    for platform in platforms {
        if !unique.contains(&platform) {
            unique.push(platform);
        }
    }
    unique
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linkedin" => Ok(Platform::LinkedIn),
            "facebook" => Ok(Platform::Facebook),
            "twitter" | "x" => Ok(Platform::Twitter),
            "instagram" => Ok(Platform::Instagram),
            other => Err(CadenceError::Validation(format!(
                "Unsupported platform '{}'. Valid options: linkedin, facebook, twitter, instagram",
                other
            ))),
        }
    }
}

// ============================================================================
// Post
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    PendingReview,
    Scheduled,
    Posted,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::PendingReview => "pending_review",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Posted => "posted",
            PostStatus::Failed => "failed",
        }
    }

    /// `posted` and `failed` have no further automatic transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, PostStatus::Posted | PostStatus::Failed)
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "pending_review" => Ok(PostStatus::PendingReview),
            "scheduled" => Ok(PostStatus::Scheduled),
            "posted" => Ok(PostStatus::Posted),
            "failed" => Ok(PostStatus::Failed),
            other => Err(CadenceError::Validation(format!(
                "Unknown post status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Educational,
    Promotional,
    Casual,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Educational => "educational",
            Tone::Promotional => "promotional",
            Tone::Casual => "casual",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "professional" => Ok(Tone::Professional),
            "educational" => Ok(Tone::Educational),
            "promotional" => Ok(Tone::Promotional),
            "casual" => Ok(Tone::Casual),
            other => Err(CadenceError::Validation(format!(
                "Unknown tone '{}'. Valid options: professional, educational, promotional, casual",
                other
            ))),
        }
    }
}

/// A generated image and its per-platform variants
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBundle {
    /// Original image URL
    pub url: String,
    /// Prompt the image was generated from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Detected style ("business", "tech", "motivation", "general")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Platform-sized variants of the original
    #[serde(default)]
    pub variants: BTreeMap<Platform, String>,
}

impl ImageBundle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Image to attach for `platform`: its variant, else the original, else none.
    pub fn resolve(&self, platform: Platform) -> Option<&str> {
        self.variants
            .get(&platform)
            .map(String::as_str)
            .filter(|url| !url.is_empty())
            .or_else(|| Some(self.url.as_str()).filter(|url| !url.is_empty()))
    }
}

/// Resolve the image for a platform given by name.
///
/// Names outside the known platform set resolve to no image.
pub fn resolve_image<'a>(bundle: Option<&'a ImageBundle>, platform: &str) -> Option<&'a str> {
    let platform = platform.parse::<Platform>().ok()?;
    bundle?.resolve(platform)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failed,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Success => "success",
            ResultStatus::Failed => "failed",
        }
    }
}

/// Outcome of publishing one Post to one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformResult {
    pub platform: Platform,
    pub status: ResultStatus,
    /// Platform-specific post ID (if successful)
    pub post_id: Option<String>,
    /// Public URL of the published post (if successful)
    pub url: Option<String>,
    /// Error message (if failed)
    pub error: Option<String>,
    pub posted_at: i64,
}

impl PlatformResult {
    pub fn success(platform: Platform, post_id: String, url: String, posted_at: i64) -> Self {
        Self {
            platform,
            status: ResultStatus::Success,
            post_id: Some(post_id),
            url: Some(url),
            error: None,
            posted_at,
        }
    }

    pub fn failed(platform: Platform, error: impl Into<String>, posted_at: i64) -> Self {
        Self {
            platform,
            status: ResultStatus::Failed,
            post_id: None,
            url: None,
            error: Some(error.into()),
            posted_at,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

/// One generated content item and its publish lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub owner: String,
    pub topic: String,
    pub explanation: String,
    pub tone: Tone,
    /// Text per platform
    pub content: BTreeMap<Platform, String>,
    pub image: Option<ImageBundle>,
    pub platforms: Vec<Platform>,
    pub status: PostStatus,
    pub requires_approval: bool,
    pub is_approved: bool,
    pub scheduled_time: Option<i64>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub post_results: Vec<PlatformResult>,
    pub posted_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Post {
    /// A fresh draft with no content, targeting no platforms yet
    pub fn new(owner: impl Into<String>, topic: impl Into<String>, explanation: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            owner: owner.into(),
            topic: topic.into(),
            explanation: explanation.into(),
            tone: Tone::default(),
            content: BTreeMap::new(),
            image: None,
            platforms: Vec::new(),
            status: PostStatus::Draft,
            requires_approval: false,
            is_approved: false,
            scheduled_time: None,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            post_results: Vec::new(),
            posted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn successes(&self) -> usize {
        self.post_results.iter().filter(|r| r.is_success()).count()
    }

    /// Check the record-level invariants.
    ///
    /// Returns a description of the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.status == PostStatus::Posted && self.successes() == 0 {
            return Err("posted post has no successful platform result".to_string());
        }
        if self.status == PostStatus::Scheduled {
            if self.scheduled_time.is_none() {
                return Err("scheduled post has no scheduled time".to_string());
            }
            if self.requires_approval && !self.is_approved {
                return Err("scheduled post requires approval but is not approved".to_string());
            }
        }
        if self.retry_count > self.max_retries {
            return Err(format!(
                "retry count {} exceeds max retries {}",
                self.retry_count, self.max_retries
            ));
        }
        if unique_platforms(self.platforms.iter().copied()).len() != self.platforms.len() {
            return Err("target platforms contain a duplicate".to_string());
        }
        if let Some(stray) = self
            .post_results
            .iter()
            .find(|r| !self.platforms.contains(&r.platform))
        {
            return Err(format!(
                "result recorded for {} which is not a target platform",
                stray.platform
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Schedule
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    Today,
    Weekly,
    Monthly,
}

impl ScheduleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleType::Today => "today",
            ScheduleType::Weekly => "weekly",
            ScheduleType::Monthly => "monthly",
        }
    }
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleType {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "today" => Ok(ScheduleType::Today),
            "weekly" => Ok(ScheduleType::Weekly),
            "monthly" => Ok(ScheduleType::Monthly),
            other => Err(CadenceError::Validation(format!(
                "Unknown schedule type '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<chrono::Weekday> for DayOfWeek {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => DayOfWeek::Monday,
            chrono::Weekday::Tue => DayOfWeek::Tuesday,
            chrono::Weekday::Wed => DayOfWeek::Wednesday,
            chrono::Weekday::Thu => DayOfWeek::Thursday,
            chrono::Weekday::Fri => DayOfWeek::Friday,
            chrono::Weekday::Sat => DayOfWeek::Saturday,
            chrono::Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

/// What to publish on one weekday
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTemplate {
    pub topic: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyConfig {
    /// Weekday → template. Days without an entry publish nothing.
    #[serde(default)]
    pub days: BTreeMap<DayOfWeek, DayTemplate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentGoal {
    Branding,
    Leads,
    Engagement,
}

impl FromStr for ContentGoal {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "branding" => Ok(ContentGoal::Branding),
            "leads" => Ok(ContentGoal::Leads),
            "engagement" => Ok(ContentGoal::Engagement),
            other => Err(CadenceError::Validation(format!(
                "Invalid content goal '{}'. Valid options: branding, leads, engagement",
                other
            ))),
        }
    }
}

impl fmt::Display for ContentGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContentGoal::Branding => "branding",
            ContentGoal::Leads => "leads",
            ContentGoal::Engagement => "engagement",
        })
    }
}

/// Percentage weights of the monthly content mix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub educational: u8,
    pub engagement: u8,
    pub promotional: u8,
}

impl Default for Distribution {
    fn default() -> Self {
        Self {
            educational: 60,
            engagement: 25,
            promotional: 15,
        }
    }
}

impl Distribution {
    pub fn total(&self) -> u32 {
        u32::from(self.educational) + u32::from(self.engagement) + u32::from(self.promotional)
    }
}

/// One pre-planned day of a monthly schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTopic {
    /// Day of month, 1-based
    pub day: u32,
    pub topic: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyConfig {
    pub industry: String,
    pub target_audience: String,
    pub content_goal: ContentGoal,
    #[serde(default)]
    pub distribution: Distribution,
    #[serde(default)]
    pub topics: Vec<MonthlyTopic>,
}

/// Type-specific configuration of a Schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScheduleKind {
    Today,
    Weekly(WeeklyConfig),
    Monthly(MonthlyConfig),
}

impl ScheduleKind {
    pub fn schedule_type(&self) -> ScheduleType {
        match self {
            ScheduleKind::Today => ScheduleType::Today,
            ScheduleKind::Weekly(_) => ScheduleType::Weekly,
            ScheduleKind::Monthly(_) => ScheduleType::Monthly,
        }
    }
}

/// A one-shot or recurring definition that produces Posts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub owner: String,
    pub kind: ScheduleKind,
    /// Posts produced by this schedule, oldest first
    pub post_ids: Vec<String>,
    pub is_active: bool,
    pub next_run_date: Option<i64>,
    pub last_run_date: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Schedule {
    pub fn new(owner: impl Into<String>, kind: ScheduleKind) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            owner: owner.into(),
            kind,
            post_ids: Vec::new(),
            is_active: true,
            next_run_date: None,
            last_run_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn schedule_type(&self) -> ScheduleType {
        self.kind.schedule_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle_with_two_variants() -> ImageBundle {
        let mut bundle = ImageBundle::new("https://img.example/original.png");
        bundle
            .variants
            .insert(Platform::LinkedIn, "https://img.example/linkedin.jpg".to_string());
        bundle
            .variants
            .insert(Platform::Twitter, "https://img.example/twitter.jpg".to_string());
        bundle
    }

    #[test]
    fn test_platform_round_trip_names() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
        assert_eq!("X".parse::<Platform>().unwrap(), Platform::Twitter);
        assert_eq!(" LinkedIn ".parse::<Platform>().unwrap(), Platform::LinkedIn);
    }

    #[test]
    fn test_platform_unknown_is_validation_error() {
        let err = "myspace".parse::<Platform>().unwrap_err();
        assert!(matches!(err, CadenceError::Validation(_)));
        assert!(err.to_string().contains("myspace"));
    }

    #[test]
    fn test_platform_index_matches_all() {
        for (i, platform) in Platform::ALL.iter().enumerate() {
            assert_eq!(platform.index(), i);
        }
    }

    #[test]
    fn test_platform_serde_lowercase() {
        let json = serde_json::to_string(&Platform::LinkedIn).unwrap();
        assert_eq!(json, "\"linkedin\"");
        let back: Platform = serde_json::from_str("\"instagram\"").unwrap();
        assert_eq!(back, Platform::Instagram);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(PostStatus::PendingReview.as_str(), "pending_review");
        assert_eq!(
            "pending_review".parse::<PostStatus>().unwrap(),
            PostStatus::PendingReview
        );
        assert!("publishing".parse::<PostStatus>().is_err());
        assert!(PostStatus::Posted.is_terminal());
        assert!(PostStatus::Failed.is_terminal());
        assert!(!PostStatus::Scheduled.is_terminal());
    }

    #[test]
    fn test_image_resolution_prefers_variant() {
        let bundle = bundle_with_two_variants();
        assert_eq!(
            bundle.resolve(Platform::LinkedIn),
            Some("https://img.example/linkedin.jpg")
        );
        assert_eq!(
            bundle.resolve(Platform::Twitter),
            Some("https://img.example/twitter.jpg")
        );
    }

    #[test]
    fn test_image_resolution_falls_back_to_original() {
        let bundle = bundle_with_two_variants();
        assert_eq!(
            bundle.resolve(Platform::Facebook),
            Some("https://img.example/original.png")
        );
        assert_eq!(
            resolve_image(Some(&bundle), "facebook"),
            Some("https://img.example/original.png")
        );
    }

    #[test]
    fn test_image_resolution_unlisted_platform_is_none() {
        let bundle = bundle_with_two_variants();
        assert_eq!(resolve_image(Some(&bundle), "tiktok"), None);
    }

    #[test]
    fn test_image_resolution_without_bundle_or_url() {
        assert_eq!(resolve_image(None, "linkedin"), None);

        let empty = ImageBundle::default();
        assert_eq!(empty.resolve(Platform::Facebook), None);
    }

    #[test]
    fn test_empty_variant_falls_back() {
        let mut bundle = ImageBundle::new("https://img.example/original.png");
        bundle.variants.insert(Platform::Instagram, String::new());
        assert_eq!(
            bundle.resolve(Platform::Instagram),
            Some("https://img.example/original.png")
        );
    }

    #[test]
    fn test_new_post_defaults() {
        let post = Post::new("owner-1", "Topic", "Explanation");
        assert_eq!(post.status, PostStatus::Draft);
        assert_eq!(post.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(post.retry_count, 0);
        assert!(post.check_invariants().is_ok());
    }

    #[test]
    fn test_unique_platforms_keeps_first_seen_order() {
        let platforms = unique_platforms([
            Platform::Twitter,
            Platform::LinkedIn,
            Platform::Twitter,
            Platform::LinkedIn,
        ]);
        assert_eq!(platforms, vec![Platform::Twitter, Platform::LinkedIn]);

        let mut post = Post::new("owner-1", "Topic", "Explanation");
        post.platforms = vec![Platform::LinkedIn, Platform::LinkedIn];
        assert!(post.check_invariants().is_err());
    }

    #[test]
    fn test_invariant_posted_requires_success() {
        let mut post = Post::new("owner-1", "Topic", "Explanation");
        post.platforms = vec![Platform::LinkedIn];
        post.status = PostStatus::Posted;
        post.post_results = vec![PlatformResult::failed(Platform::LinkedIn, "boom", 0)];
        assert!(post.check_invariants().is_err());

        post.post_results = vec![PlatformResult::success(
            Platform::LinkedIn,
            "1".to_string(),
            "https://linkedin/1".to_string(),
            0,
        )];
        assert!(post.check_invariants().is_ok());
    }

    #[test]
    fn test_invariant_scheduled_requires_time_and_approval() {
        let mut post = Post::new("owner-1", "Topic", "Explanation");
        post.status = PostStatus::Scheduled;
        assert!(post.check_invariants().is_err());

        post.scheduled_time = Some(100);
        post.requires_approval = true;
        assert!(post.check_invariants().is_err());

        post.is_approved = true;
        assert!(post.check_invariants().is_ok());
    }

    #[test]
    fn test_invariant_results_within_targets() {
        let mut post = Post::new("owner-1", "Topic", "Explanation");
        post.platforms = vec![Platform::Twitter];
        post.post_results = vec![PlatformResult::failed(Platform::Facebook, "x", 0)];
        let err = post.check_invariants().unwrap_err();
        assert!(err.contains("facebook"));
    }

    #[test]
    fn test_schedule_kind_serde_is_tagged() {
        let mut config = WeeklyConfig::default();
        config.days.insert(
            DayOfWeek::Monday,
            DayTemplate {
                topic: "AI in Healthcare".to_string(),
                explanation: String::new(),
                platforms: vec![Platform::LinkedIn],
            },
        );
        let json = serde_json::to_value(ScheduleKind::Weekly(config.clone())).unwrap();
        assert_eq!(json["type"], "weekly");
        assert_eq!(json["days"]["monday"]["topic"], "AI in Healthcare");

        let back: ScheduleKind = serde_json::from_value(json).unwrap();
        assert_eq!(back, ScheduleKind::Weekly(config));
    }

    #[test]
    fn test_day_of_week_from_chrono() {
        assert_eq!(DayOfWeek::from(chrono::Weekday::Mon), DayOfWeek::Monday);
        assert_eq!(DayOfWeek::from(chrono::Weekday::Sun), DayOfWeek::Sunday);
    }

    #[test]
    fn test_distribution_default_sums_to_hundred() {
        assert_eq!(Distribution::default().total(), 100);
    }
}
