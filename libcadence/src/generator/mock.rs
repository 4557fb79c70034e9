//! Mock generators for testing

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{
    generation_failure_text, ContentGenerator, GeneratedImage, GenerationRequest,
    ImageGenerator, PlanRequest,
};
use crate::error::GenerationError;
use crate::types::Platform;

/// Content generator returning `"<platform>: <topic>"` for each platform
#[derive(Debug, Default)]
pub struct MockContentGenerator {
    /// Platforms whose generation "fails"
    pub failing_platforms: Vec<Platform>,
    /// Text returned by `plan_month`; `None` makes it fail
    pub plan: Option<String>,
    calls: AtomicUsize,
}

impl MockContentGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(platforms: Vec<Platform>) -> Self {
        Self {
            failing_platforms: platforms,
            ..Self::default()
        }
    }

    pub fn with_plan(plan: impl Into<String>) -> Self {
        Self {
            plan: Some(plan.into()),
            ..Self::default()
        }
    }

    /// Number of `generate_for_platforms` calls
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator for MockContentGenerator {
    async fn generate_for_platforms(&self, request: &GenerationRequest) -> BTreeMap<Platform, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        request
            .platforms
            .iter()
            .map(|&platform| {
                let text = if self.failing_platforms.contains(&platform) {
                    generation_failure_text(platform, "mock generation failure")
                } else {
                    format!("{}: {}", platform, request.topic)
                };
                (platform, text)
            })
            .collect()
    }

    async fn plan_month(&self, _request: &PlanRequest) -> Result<String, GenerationError> {
        self.plan
            .clone()
            .ok_or_else(|| GenerationError::Request("mock plan unavailable".to_string()))
    }
}

/// Image generator returning fixed URLs, with a variant for every platform
#[derive(Debug, Default)]
pub struct MockImageGenerator {
    pub fail: bool,
    calls: AtomicUsize,
}

impl MockImageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(GenerationError::Request("mock image failure".to_string()));
        }
        Ok(GeneratedImage {
            url: "https://img.example/mock.png".to_string(),
            prompt: prompt.to_string(),
        })
    }

    async fn make_variants(&self, url: &str) -> BTreeMap<Platform, String> {
        Platform::ALL
            .into_iter()
            .map(|platform| (platform, format!("{}?variant={}", url, platform)))
            .collect()
    }
}
