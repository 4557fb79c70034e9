//! Content and image generation
//!
//! Generators are external collaborators: the expander and the creation
//! entry points call them, but never own their failures. Text generation is
//! infallible at the API level: a platform whose text could not be
//! generated gets an error-annotated string instead (see
//! [`generation_failure_text`]), which the publisher refuses to post.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::GeneratorConfig;
use crate::error::{GenerationError, Result};
use crate::types::{ContentGoal, Distribution, Platform, Tone};

pub mod mock;
pub mod openai;
pub mod template;

const FAILURE_PREFIX: &str = "Error generating content for ";

/// Input of a per-platform text generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub topic: String,
    pub explanation: String,
    pub tone: Tone,
    pub platforms: Vec<Platform>,
}

/// Input of a monthly content plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    pub industry: String,
    pub target_audience: String,
    pub content_goal: ContentGoal,
    pub distribution: Distribution,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub url: String,
    pub prompt: String,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Text for each requested platform.
    ///
    /// Always returns one entry per platform. Entries for which generation
    /// failed hold [`generation_failure_text`] rather than usable content.
    async fn generate_for_platforms(&self, request: &GenerationRequest) -> BTreeMap<Platform, String>;

    /// Raw text of a 30-day plan, to be decoded with [`crate::plan::parse_monthly_plan`]
    async fn plan_month(&self, request: &PlanRequest) -> std::result::Result<String, GenerationError>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> std::result::Result<GeneratedImage, GenerationError>;

    /// Per-platform variants of `url`. A platform whose variant could not be
    /// produced maps to `url` itself.
    async fn make_variants(&self, url: &str) -> BTreeMap<Platform, String>;
}

/// The generators a service runs with
#[derive(Clone)]
pub struct Generators {
    pub content: Arc<dyn ContentGenerator>,
    pub images: Option<Arc<dyn ImageGenerator>>,
}

impl Generators {
    /// OpenAI-compatible generation when configured, otherwise the offline
    /// template generator without image support.
    pub fn from_config(config: Option<&GeneratorConfig>) -> Result<Self> {
        match config {
            Some(config) => {
                let generator = Arc::new(openai::OpenAiGenerator::new(config)?);
                let images: Arc<dyn ImageGenerator> = generator.clone();
                Ok(Self {
                    content: generator,
                    images: Some(images),
                })
            }
            None => {
                tracing::info!("No [generator] configured, using offline templates");
                Ok(Self {
                    content: Arc::new(template::TemplateGenerator),
                    images: None,
                })
            }
        }
    }
}

/// Placeholder stored for a platform whose text could not be generated
pub fn generation_failure_text(platform: Platform, reason: impl std::fmt::Display) -> String {
    format!("{}{}: {}", FAILURE_PREFIX, platform, reason)
}

pub fn is_generation_failure(text: &str) -> bool {
    text.starts_with(FAILURE_PREFIX)
}

/// Prompt asking for one platform's post
pub fn platform_prompt(platform: Platform, request: &GenerationRequest) -> String {
    let requirements = match platform {
        Platform::LinkedIn => {
            "- Professional and engaging\n\
             - 150-300 words\n\
             - Include relevant industry insights\n\
             - Add 3-5 relevant hashtags\n\
             - End with a thought-provoking question or call-to-action"
        }
        Platform::Facebook => {
            "- Engaging and conversational\n\
             - 100-200 words\n\
             - Use friendly, approachable language and emojis where appropriate\n\
             - Add 2-3 relevant hashtags\n\
             - Include a clear call-to-action"
        }
        Platform::Twitter => {
            "- Concise and impactful\n\
             - Maximum 280 characters\n\
             - Include 1-2 relevant hashtags"
        }
        Platform::Instagram => {
            "- Engaging and visually descriptive\n\
             - 150-300 words\n\
             - Use emojis strategically\n\
             - Include 5-10 relevant hashtags\n\
             - Include a call-to-action"
        }
    };

    format!(
        "Create a {} post about: \"{}\"\n\nContext: {}\nTone: {}\n\nRequirements:\n{}\n\nWrite the post now:",
        platform_label(platform),
        request.topic,
        request.explanation,
        request.tone,
        requirements
    )
}

fn platform_label(platform: Platform) -> &'static str {
    match platform {
        Platform::LinkedIn => "LinkedIn",
        Platform::Facebook => "Facebook",
        Platform::Twitter => "Twitter/X",
        Platform::Instagram => "Instagram caption",
    }
}

/// Prompt asking for a 30-day plan as a JSON array
pub fn monthly_plan_prompt(request: &PlanRequest) -> String {
    format!(
        r#"Create a comprehensive monthly content plan for:
- Industry: {}
- Target Audience: {}
- Content Goal: {}
- Distribution: {}% educational, {}% engagement, {}% promotional

Generate 30 unique topics (one for each day of the month) with a day number (1-30),
a topic title, a short explanation (1-2 sentences), a recommended tone
(professional, educational, promotional or casual) and suggested platforms
(linkedin, facebook, twitter, instagram).

Format as a JSON array:
[{{"day": 1, "topic": "Topic title", "explanation": "Brief explanation", "tone": "professional", "platforms": ["linkedin", "twitter"]}}]"#,
        request.industry,
        request.target_audience,
        request.content_goal,
        request.distribution.educational,
        request.distribution.engagement,
        request.distribution.promotional
    )
}

/// Visual style picked for a post's image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStyle {
    Business,
    Tech,
    Motivation,
    General,
}

const BUSINESS_KEYWORDS: &[&str] = &[
    "business",
    "corporate",
    "strategy",
    "management",
    "leadership",
    "enterprise",
    "company",
    "professional",
];

const TECH_KEYWORDS: &[&str] = &[
    "technology",
    "ai",
    "software",
    "digital",
    "innovation",
    "tech",
    "coding",
    "developer",
    "startup",
    "app",
];

const MOTIVATION_KEYWORDS: &[&str] = &[
    "motivation",
    "inspiration",
    "success",
    "growth",
    "achievement",
    "goal",
    "dream",
    "aspire",
    "empower",
];

impl ImageStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStyle::Business => "business",
            ImageStyle::Tech => "tech",
            ImageStyle::Motivation => "motivation",
            ImageStyle::General => "general",
        }
    }

    /// Pick a style from keywords in the topic and explanation.
    ///
    /// Keywords match whole words, checked in business, tech, motivation order.
    pub fn detect(topic: &str, explanation: &str) -> Self {
        let text = format!("{} {}", topic, explanation).to_lowercase();
        let words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let mentions = |keywords: &[&str]| words.iter().any(|w| keywords.contains(w));

        if mentions(BUSINESS_KEYWORDS) {
            ImageStyle::Business
        } else if mentions(TECH_KEYWORDS) {
            ImageStyle::Tech
        } else if mentions(MOTIVATION_KEYWORDS) {
            ImageStyle::Motivation
        } else {
            ImageStyle::General
        }
    }

    /// Image prompt in this style
    pub fn prompt(&self, topic: &str, explanation: &str) -> String {
        match self {
            ImageStyle::Business => format!(
                "A minimal, clean, professional illustration in a modern business style. {}. {}. \
                 Use a minimalist design with subtle colors, clean lines and professional aesthetics.",
                topic, explanation
            ),
            ImageStyle::Tech => format!(
                "An abstract, futuristic, tech-inspired visual. {}. {}. \
                 Use abstract shapes, digital elements and vibrant colors.",
                topic, explanation
            ),
            ImageStyle::Motivation => format!(
                "A human-centric, inspiring image. {}. {}. \
                 Use warm imagery with people, natural lighting and positive emotions.",
                topic, explanation
            ),
            ImageStyle::General => format!(
                "A professional, high-quality image related to: {}. {}. \
                 The image should be suitable for social media and relevant to the content.",
                topic, explanation
            ),
        }
    }
}
