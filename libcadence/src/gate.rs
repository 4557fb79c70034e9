//! Approval gate
//!
//! Decides whether a Post may be published, and implements the human
//! approval step that releases Posts held for review.

use std::collections::BTreeMap;

use crate::error::{CadenceError, Result};
use crate::types::{Platform, Post, PostStatus};

/// Whether the scheduler may publish `post` at `now` (unix seconds)
pub fn is_eligible(post: &Post, now: i64) -> bool {
    post.status == PostStatus::Scheduled
        && post.scheduled_time.is_some_and(|at| at <= now)
        && (!post.requires_approval || post.is_approved)
}

/// Approve a Post held for review.
///
/// Edited text replaces the generated text per platform; platforms not
/// mentioned in `edited` keep their content. The Post becomes `scheduled`
/// when it has a scheduled time and `draft` otherwise.
///
/// # Errors
///
/// - `CadenceError::InvalidState` unless the Post is `pending_review`
/// - `CadenceError::Validation` if `edited` names a platform the Post does
///   not target; the Post is left unchanged
pub fn approve(post: &mut Post, edited: Option<BTreeMap<Platform, String>>) -> Result<()> {
    if post.status != PostStatus::PendingReview {
        return Err(CadenceError::InvalidState(format!(
            "Post {} is {}, only pending_review posts can be approved",
            post.id, post.status
        )));
    }

    if let Some(stray) = edited
        .iter()
        .flat_map(BTreeMap::keys)
        .find(|platform| !post.platforms.contains(*platform))
    {
        return Err(CadenceError::Validation(format!(
            "Post {} does not target {}",
            post.id, stray
        )));
    }

    if let Some(edited) = edited {
        post.content.extend(edited);
    }

    post.is_approved = true;
    post.status = if post.scheduled_time.is_some() {
        PostStatus::Scheduled
    } else {
        PostStatus::Draft
    };
    post.updated_at = chrono::Utc::now().timestamp();
    Ok(())
}

/// How a Post came into being, which fixes its approval policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    /// Single post requested by a person for today
    Today,
    /// Unattended weekly expansion
    Weekly,
    /// Unattended monthly expansion
    Monthly,
}

impl EntryPoint {
    /// Single posts wait for review; bulk-generated posts publish unattended
    pub fn default_requires_approval(&self) -> bool {
        matches!(self, EntryPoint::Today)
    }

    pub fn initial_status(requires_approval: bool) -> PostStatus {
        if requires_approval {
            PostStatus::PendingReview
        } else {
            PostStatus::Scheduled
        }
    }
}
