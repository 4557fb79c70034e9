//! Post transitions after a publish attempt

use crate::publisher::any_success;
use crate::types::{PlatformResult, Post, PostStatus};

/// What a publish attempt did to a Post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// At least one platform accepted the post
    Posted,
    /// Every platform failed; the Post was rescheduled
    Retrying,
    /// Every platform failed and the retry budget is spent
    Failed,
}

/// Apply a scheduler-driven attempt.
///
/// Total failure consumes one retry and pushes `scheduled_time` to
/// `now + retry_delay`; once `retry_count` reaches `max_retries` the Post is
/// failed for good and its time stops advancing.
pub fn apply_scheduled_outcome(
    post: &mut Post,
    results: Vec<PlatformResult>,
    now: i64,
    retry_delay: i64,
) -> Outcome {
    post.updated_at = now;

    if any_success(&results) {
        mark_posted(post, results, now);
        return Outcome::Posted;
    }

    post.post_results = results;
    post.retry_count = (post.retry_count + 1).min(post.max_retries);
    if post.retry_count >= post.max_retries {
        post.status = PostStatus::Failed;
        Outcome::Failed
    } else {
        post.status = PostStatus::Scheduled;
        post.scheduled_time = Some(now + retry_delay);
        Outcome::Retrying
    }
}

/// Apply a manual publish-now attempt: any success posts, total failure fails
pub fn apply_manual_outcome(post: &mut Post, results: Vec<PlatformResult>, now: i64) -> Outcome {
    post.updated_at = now;

    if any_success(&results) {
        mark_posted(post, results, now);
        Outcome::Posted
    } else {
        post.post_results = results;
        post.status = PostStatus::Failed;
        Outcome::Failed
    }
}

fn mark_posted(post: &mut Post, results: Vec<PlatformResult>, now: i64) {
    post.status = PostStatus::Posted;
    post.posted_at = Some(now);
    post.retry_count = 0;
    post.post_results = results;
}
