//! Multi-platform publishing
//!
//! Fans one Post's content out to each of its target platforms
//! concurrently. Every platform is attempted independently under the retry
//! policy, and every requested platform yields exactly one
//! [`PlatformResult`]: failures are captured per platform and never abort
//! the others.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::PublisherConfig;
use crate::error::PlatformError;
use crate::generator;
use crate::platforms::{PlatformClient, PlatformTable, PostingResult, PublishedPost};
use crate::types::{ImageBundle, Platform, PlatformResult};

/// Per-platform retry policy.
///
/// Attempt `n` that fails with a transient error is followed by a pause of
/// `n * base_delay` (linear backoff) until `max_attempts` is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &PublisherConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.backoff_ms))
    }

    /// Pause after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Aggregate interpretation of a fan-out: at least one platform succeeded
pub fn any_success(results: &[PlatformResult]) -> bool {
    results.iter().any(PlatformResult::is_success)
}

pub struct Publisher {
    platforms: PlatformTable,
    retry: RetryPolicy,
}

impl Publisher {
    pub fn new(platforms: PlatformTable, retry: RetryPolicy) -> Self {
        Self { platforms, retry }
    }

    pub fn platforms(&self) -> &PlatformTable {
        &self.platforms
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Publish to every platform in `platforms`.
    ///
    /// Returns one result per requested platform, in request order.
    pub async fn publish(
        &self,
        owner: &str,
        content: &BTreeMap<Platform, String>,
        platforms: &[Platform],
        image: Option<&ImageBundle>,
    ) -> Vec<PlatformResult> {
        debug!(
            "Publishing for {} to {} platform(s): {:?}",
            owner,
            platforms.len(),
            platforms
        );

        let attempts = platforms.iter().map(|&platform| {
            let text = content.get(&platform).map(String::as_str);
            let image_url = image.and_then(|bundle| bundle.resolve(platform));
            self.publish_one(platform, text, image_url)
        });

        join_all(attempts).await
    }

    async fn publish_one(
        &self,
        platform: Platform,
        content: Option<&str>,
        image_url: Option<&str>,
    ) -> PlatformResult {
        let Some(client) = self.platforms.get(platform) else {
            return PlatformResult::failed(
                platform,
                format!("{} account not connected", platform),
                now(),
            );
        };

        let content = match content {
            Some(text) if generator::is_generation_failure(text) => {
                return PlatformResult::failed(platform, text, now());
            }
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                return PlatformResult::failed(
                    platform,
                    format!("No content generated for {}", platform),
                    now(),
                );
            }
        };

        match self.post_with_retry(client.as_ref(), content, image_url).await {
            Ok(published) => {
                info!("Published to {}: {}", platform, published.post_id);
                PlatformResult::success(platform, published.post_id, published.url, now())
            }
            Err(e) => {
                warn!("Publishing to {} failed: {}", platform, e);
                PlatformResult::failed(platform, e.to_string(), now())
            }
        }
    }

    /// Post with retry, degrading to text-only when the image step fails
    async fn post_with_retry(
        &self,
        client: &dyn PlatformClient,
        content: &str,
        image_url: Option<&str>,
    ) -> PostingResult<PublishedPost> {
        let platform = client.platform();
        let max_attempts = self.retry.max_attempts;
        let mut image_url = image_url;
        let mut attempt = 1;

        loop {
            let outcome = match client.post(content, image_url).await {
                Err(PlatformError::Media(reason)) if image_url.is_some() => {
                    warn!(
                        "Image step failed on {}: {}. Posting text-only",
                        platform, reason
                    );
                    image_url = None;
                    client.post(content, None).await
                }
                other => other,
            };

            match outcome {
                Ok(published) => {
                    if attempt > 1 {
                        info!("Posted to {} on attempt {}", platform, attempt);
                    }
                    return Ok(published);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        "Transient error posting to {} (attempt {}/{}): {}. Retrying in {:?}",
                        platform, attempt, max_attempts, e, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt == max_attempts && max_attempts > 1 {
                        warn!(
                            "Giving up on {} after {} attempts: {}",
                            platform, max_attempts, e
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockClient;
    use crate::types::ResultStatus;
    use std::sync::Arc;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    fn content_for(platforms: &[Platform]) -> BTreeMap<Platform, String> {
        platforms
            .iter()
            .map(|p| (*p, format!("Text for {}", p)))
            .collect()
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_any_success() {
        let failed = PlatformResult::failed(Platform::Twitter, "x", 0);
        let ok = PlatformResult::success(Platform::LinkedIn, "1".into(), "u".into(), 0);
        assert!(!any_success(&[]));
        assert!(!any_success(&[failed.clone()]));
        assert!(any_success(&[failed, ok]));
    }

    #[tokio::test]
    async fn test_one_result_per_platform_even_when_all_fail() {
        let platforms = [Platform::LinkedIn, Platform::Facebook, Platform::Twitter];
        let table = PlatformTable::new()
            .with(Arc::new(MockClient::failure(
                Platform::LinkedIn,
                PlatformError::Authentication("revoked".to_string()),
            )))
            .with(Arc::new(MockClient::failure(
                Platform::Twitter,
                PlatformError::Network("reset".to_string()),
            )));
        // Facebook has no client at all
        let publisher = Publisher::new(table, fast_retry());

        let results = publisher
            .publish("owner", &content_for(&platforms), &platforms, None)
            .await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.status == ResultStatus::Failed));
        assert!(results[1].error.as_ref().unwrap().contains("not connected"));
        assert!(!any_success(&results));
    }

    #[tokio::test]
    async fn test_partial_success_keeps_both_results() {
        let linkedin = Arc::new(MockClient::success(Platform::LinkedIn));
        let twitter = Arc::new(MockClient::failure(
            Platform::Twitter,
            PlatformError::Network("timeout".to_string()),
        ));
        let table = PlatformTable::new()
            .with(linkedin.clone())
            .with(twitter.clone());
        let publisher = Publisher::new(table, fast_retry());
        let platforms = [Platform::LinkedIn, Platform::Twitter];

        let results = publisher
            .publish("owner", &content_for(&platforms), &platforms, None)
            .await;

        assert_eq!(results[0].platform, Platform::LinkedIn);
        assert!(results[0].is_success());
        assert!(results[0].post_id.is_some());
        assert_eq!(results[1].platform, Platform::Twitter);
        assert!(!results[1].is_success());
        assert!(results[1].error.as_ref().unwrap().contains("timeout"));
        assert_eq!(twitter.call_count(), 3);
        assert_eq!(linkedin.call_count(), 1);
        assert!(any_success(&results));
    }

    #[tokio::test]
    async fn test_platforms_publish_concurrently() {
        let delay = Duration::from_millis(300);
        let platforms = [Platform::LinkedIn, Platform::Facebook, Platform::Twitter];
        let table = platforms.iter().fold(PlatformTable::new(), |table, p| {
            table.with(Arc::new(MockClient::with_delay(*p, delay)))
        });
        let publisher = Publisher::new(table, fast_retry());

        let started = std::time::Instant::now();
        let results = publisher
            .publish("owner", &content_for(&platforms), &platforms, None)
            .await;
        let elapsed = started.elapsed();

        assert!(results.iter().all(PlatformResult::is_success));
        assert!(elapsed >= delay);
        assert!(elapsed < delay * 2, "fan-out took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_within_budget() {
        let flaky = Arc::new(MockClient::flaky(
            Platform::Facebook,
            2,
            PlatformError::RateLimit("429".to_string()),
        ));
        let publisher = Publisher::new(PlatformTable::new().with(flaky.clone()), fast_retry());

        let results = publisher
            .publish(
                "owner",
                &content_for(&[Platform::Facebook]),
                &[Platform::Facebook],
                None,
            )
            .await;

        assert!(results[0].is_success());
        assert_eq!(flaky.call_count(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let client = Arc::new(MockClient::failure(
            Platform::LinkedIn,
            PlatformError::Validation("too long".to_string()),
        ));
        let publisher = Publisher::new(PlatformTable::new().with(client.clone()), fast_retry());

        let results = publisher
            .publish(
                "owner",
                &content_for(&[Platform::LinkedIn]),
                &[Platform::LinkedIn],
                None,
            )
            .await;

        assert!(!results[0].is_success());
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_image_failure_degrades_to_text_only() {
        let client = Arc::new(MockClient::image_failure(Platform::Twitter));
        let publisher = Publisher::new(PlatformTable::new().with(client.clone()), fast_retry());
        let mut image = ImageBundle::new("https://img.example/original.png");
        image
            .variants
            .insert(Platform::Twitter, "https://img.example/twitter.jpg".to_string());

        let results = publisher
            .publish(
                "owner",
                &content_for(&[Platform::Twitter]),
                &[Platform::Twitter],
                Some(&image),
            )
            .await;

        assert!(results[0].is_success());
        let published = client.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].image_url, None);
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_resolved_image_is_passed_to_client() {
        let linkedin = Arc::new(MockClient::success(Platform::LinkedIn));
        let facebook = Arc::new(MockClient::success(Platform::Facebook));
        let publisher = Publisher::new(
            PlatformTable::new()
                .with(linkedin.clone())
                .with(facebook.clone()),
            fast_retry(),
        );
        let mut image = ImageBundle::new("https://img.example/original.png");
        image
            .variants
            .insert(Platform::LinkedIn, "https://img.example/linkedin.jpg".to_string());
        let platforms = [Platform::LinkedIn, Platform::Facebook];

        publisher
            .publish("owner", &content_for(&platforms), &platforms, Some(&image))
            .await;

        assert_eq!(
            linkedin.published()[0].image_url.as_deref(),
            Some("https://img.example/linkedin.jpg")
        );
        assert_eq!(
            facebook.published()[0].image_url.as_deref(),
            Some("https://img.example/original.png")
        );
    }

    #[tokio::test]
    async fn test_missing_or_failed_content_is_not_posted() {
        let linkedin = Arc::new(MockClient::success(Platform::LinkedIn));
        let twitter = Arc::new(MockClient::success(Platform::Twitter));
        let publisher = Publisher::new(
            PlatformTable::new()
                .with(linkedin.clone())
                .with(twitter.clone()),
            fast_retry(),
        );

        let mut content = BTreeMap::new();
        content.insert(
            Platform::Twitter,
            generator::generation_failure_text(Platform::Twitter, "quota exceeded"),
        );

        let results = publisher
            .publish(
                "owner",
                &content,
                &[Platform::LinkedIn, Platform::Twitter],
                None,
            )
            .await;

        assert_eq!(
            results[0].error.as_deref(),
            Some("No content generated for linkedin")
        );
        assert!(results[1].error.as_ref().unwrap().contains("quota exceeded"));
        assert_eq!(linkedin.call_count(), 0);
        assert_eq!(twitter.call_count(), 0);
    }
}
