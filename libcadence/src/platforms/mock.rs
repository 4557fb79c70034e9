//! Mock platform client for testing
//!
//! Configurable stand-in for a real platform: it can succeed, fail every
//! time, fail a fixed number of times before succeeding, reject only
//! requests that carry an image, and add latency. Every call is recorded so
//! tests can assert on what would have been published.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use super::{PlatformClient, PostingResult, PublishedPost};
use crate::error::PlatformError;
use crate::types::Platform;

/// Configuration for mock client behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub platform: Platform,

    /// Error returned by every call (after `failures_before_success` is used up, if set)
    pub post_error: Option<PlatformError>,

    /// Number of initial calls that fail with `post_error`; 0 means "always"
    pub failures_before_success: usize,

    /// Error returned for calls that carry an image
    pub image_error: Option<PlatformError>,

    /// Delay before completing a call (simulates network latency)
    pub delay: Duration,
}

impl MockConfig {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            post_error: None,
            failures_before_success: 0,
            image_error: None,
            delay: Duration::ZERO,
        }
    }
}

/// One call received by a [`MockClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPost {
    pub content: String,
    pub image_url: Option<String>,
}

pub struct MockClient {
    config: MockConfig,
    calls: AtomicUsize,
    published: Mutex<Vec<RecordedPost>>,
}

impl MockClient {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            calls: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        }
    }

    /// A client that always succeeds
    pub fn success(platform: Platform) -> Self {
        Self::new(MockConfig::new(platform))
    }

    /// A client that fails every call with `error`
    pub fn failure(platform: Platform, error: PlatformError) -> Self {
        Self::new(MockConfig {
            post_error: Some(error),
            ..MockConfig::new(platform)
        })
    }

    /// A client whose first `failures` calls fail with `error`
    pub fn flaky(platform: Platform, failures: usize, error: PlatformError) -> Self {
        Self::new(MockConfig {
            post_error: Some(error),
            failures_before_success: failures,
            ..MockConfig::new(platform)
        })
    }

    /// A client that rejects any request carrying an image
    pub fn image_failure(platform: Platform) -> Self {
        Self::new(MockConfig {
            image_error: Some(PlatformError::Media("mock image upload rejected".to_string())),
            ..MockConfig::new(platform)
        })
    }

    pub fn with_delay(platform: Platform, delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..MockConfig::new(platform)
        })
    }

    /// Number of times `post` was called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Successful calls, in order
    pub fn published(&self) -> Vec<RecordedPost> {
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl PlatformClient for MockClient {
    fn platform(&self) -> Platform {
        self.config.platform
    }

    async fn post(&self, content: &str, image_url: Option<&str>) -> PostingResult<PublishedPost> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(error) = &self.config.post_error {
            let limit = self.config.failures_before_success;
            if limit == 0 || call <= limit {
                return Err(error.clone());
            }
        }

        if image_url.is_some() {
            if let Some(error) = &self.config.image_error {
                return Err(error.clone());
            }
        }

        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedPost {
                content: content.to_string(),
                image_url: image_url.map(str::to_string),
            });

        let post_id = format!("{}:mock-{}", self.config.platform, uuid::Uuid::new_v4());
        Ok(PublishedPost {
            url: format!("https://{}.example/{}", self.config.platform, post_id),
            post_id,
        })
    }
}
