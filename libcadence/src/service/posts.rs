//! Manual operations on single Posts: approval, publish-now and lookup

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::db::Database;
use crate::error::{CadenceError, Result};
use crate::gate;
use crate::lifecycle::{apply_manual_outcome, Outcome};
use crate::publisher::Publisher;
use crate::types::{Platform, Post, PostStatus};

/// Default number of posts returned by [`PostService::list`]
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Result of a publish-now request
#[derive(Debug, Clone)]
pub struct PublishResponse {
    /// The Post as persisted after the attempt
    pub post: Post,
    pub outcome: Outcome,
}

#[derive(Clone)]
pub struct PostService {
    db: Database,
    publisher: Arc<Publisher>,
    publish_lease: i64,
}

impl PostService {
    pub fn new(db: Database, publisher: Arc<Publisher>, publish_lease: i64) -> Self {
        Self {
            db,
            publisher,
            publish_lease,
        }
    }

    /// Fetch one of `owner`'s posts.
    ///
    /// # Errors
    ///
    /// `CadenceError::NotFound` if the post does not exist or belongs to
    /// someone else.
    pub async fn get(&self, owner: &str, post_id: &str) -> Result<Post> {
        self.db
            .get_post_for_owner(owner, post_id)
            .await?
            .ok_or_else(|| CadenceError::NotFound(format!("Post {}", post_id)))
    }

    pub async fn list(
        &self,
        owner: &str,
        status: Option<PostStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Post>> {
        self.db
            .list_posts(owner, status, limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .await
    }

    /// Approve a post held for review, optionally replacing its text per platform.
    ///
    /// # Errors
    ///
    /// - `CadenceError::NotFound` for unknown or foreign posts
    /// - `CadenceError::InvalidState` unless the post is `pending_review`
    pub async fn approve(
        &self,
        owner: &str,
        post_id: &str,
        edited: Option<BTreeMap<Platform, String>>,
    ) -> Result<Post> {
        let mut post = self.get(owner, post_id).await?;
        gate::approve(&mut post, edited)?;
        self.db.update_post(&post).await?;

        info!("Post {} approved, now {}", post.id, post.status);
        Ok(post)
    }

    /// Publish a post immediately, outside the schedule.
    ///
    /// Any platform success marks the post `posted`; failure on every
    /// platform marks it `failed` without consuming a scheduled retry.
    ///
    /// # Errors
    ///
    /// - `CadenceError::NotFound` for unknown or foreign posts
    /// - `CadenceError::InvalidState` if the post is already posted, still
    ///   awaits approval, or is being published by someone else
    /// - `CadenceError::Validation` if the post has no content
    pub async fn publish_now(&self, owner: &str, post_id: &str) -> Result<PublishResponse> {
        let post = self.get(owner, post_id).await?;

        if post.status == PostStatus::Posted {
            return Err(CadenceError::InvalidState(format!(
                "Post {} is already posted",
                post.id
            )));
        }
        if post.requires_approval && !post.is_approved {
            return Err(CadenceError::InvalidState(format!(
                "Post {} requires approval before publishing",
                post.id
            )));
        }
        if post.content.values().all(|text| text.trim().is_empty()) {
            return Err(CadenceError::Validation(format!(
                "Post {} has no content to publish",
                post.id
            )));
        }

        let now = chrono::Utc::now().timestamp();
        if !self.db.claim_post(&post.id, now, self.publish_lease).await? {
            return Err(CadenceError::InvalidState(format!(
                "Post {} is already being published",
                post.id
            )));
        }

        // Re-read under the lease: a scheduler pass may have finished it meanwhile
        let mut post = match self.db.get_post(&post.id).await? {
            Some(fresh) if fresh.status != PostStatus::Posted => fresh,
            _ => {
                self.db.release_lease(&post.id).await?;
                return Err(CadenceError::InvalidState(format!(
                    "Post {} is already posted",
                    post.id
                )));
            }
        };

        let results = self
            .publisher
            .publish(&post.owner, &post.content, &post.platforms, post.image.as_ref())
            .await;

        let outcome = apply_manual_outcome(&mut post, results, chrono::Utc::now().timestamp());
        self.db.complete_publish(&post).await?;

        match outcome {
            Outcome::Posted => info!(
                "Post {} published to {}/{} platform(s)",
                post.id,
                post.successes(),
                post.platforms.len()
            ),
            _ => warn!("Post {} failed on every platform", post.id),
        }

        Ok(PublishResponse { post, outcome })
    }
}
