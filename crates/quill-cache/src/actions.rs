//! The named social mutations, built on the engine.
//!
//! Toggle-style actions (bookmark, like, follow) flip a status key and
//! adjust its paired count key together in the optimistic step; both roll
//! back together, so status and count never disagree. Comment actions
//! transform the paginated thread collection instead.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::debug;

use crate::api::{SocialApi, ToggleState};
use crate::engine::{MutationEngine, Snapshot};
use crate::error::MutationError;
use crate::invalidation::MutationId;
use crate::key::CacheKey;
use crate::store::CacheStore;
use crate::value::{COMMENT_DELETED_PLACEHOLDER, CacheValue, Comment, CommentThread};

/// Id carried by an optimistic comment until the server assigns a real one.
const PROVISIONAL_COMMENT_ID: u64 = 0;

/// The authenticated user on whose behalf mutations run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: u64,
}

/// Entry point for bookmark/like/follow toggles and comment mutations.
///
/// Every action checks the viewer first: an unauthenticated call is rejected
/// with [`MutationError::AuthRequired`] before the engine (and the cache)
/// is involved at all.
pub struct SocialActions {
    engine: MutationEngine,
    api: Arc<dyn SocialApi>,
    viewer: RwLock<Option<Viewer>>,
}

impl SocialActions {
    pub fn new(store: Arc<CacheStore>, api: Arc<dyn SocialApi>) -> Self {
        Self {
            engine: MutationEngine::new(store),
            api,
            viewer: RwLock::new(None),
        }
    }

    /// Set or clear the authenticated viewer.
    pub fn set_viewer(&self, viewer: Option<Viewer>) {
        *self.viewer.write().expect("viewer lock poisoned") = viewer;
        debug!(viewer = ?self.viewer(), "viewer changed");
    }

    /// The current viewer, if authenticated.
    pub fn viewer(&self) -> Option<Viewer> {
        *self.viewer.read().expect("viewer lock poisoned")
    }

    /// The store the actions write through.
    pub fn store(&self) -> &Arc<CacheStore> {
        self.engine.store()
    }

    fn require_viewer(&self) -> Result<Viewer, MutationError> {
        self.viewer().ok_or(MutationError::AuthRequired)
    }

    /// Toggle the viewer's bookmark on a post.
    pub async fn toggle_bookmark(&self, post_id: u64) -> Result<ToggleState, MutationError> {
        let viewer = self.require_viewer()?;
        let status = CacheKey::BookmarkStatus { post_id };
        let count = CacheKey::BookmarkCount { post_id };

        self.engine
            .run(
                MutationId::ToggleBookmark {
                    post_id,
                    user_id: viewer.user_id,
                },
                vec![status.clone(), count.clone()],
                |snapshot| toggle_writes(snapshot, &status, &count),
                self.api.toggle_bookmark(post_id),
                |state: &ToggleState| {
                    vec![
                        (status.clone(), CacheValue::Flag(state.active)),
                        (count.clone(), CacheValue::Count(state.count)),
                    ]
                },
            )
            .await
    }

    /// Toggle the viewer's like on a post.
    pub async fn toggle_like(&self, post_id: u64) -> Result<ToggleState, MutationError> {
        let viewer = self.require_viewer()?;
        let status = CacheKey::LikeStatus { post_id };
        let count = CacheKey::LikeCount { post_id };

        self.engine
            .run(
                MutationId::ToggleLike {
                    post_id,
                    user_id: viewer.user_id,
                },
                vec![status.clone(), count.clone()],
                |snapshot| toggle_writes(snapshot, &status, &count),
                self.api.toggle_like(post_id),
                |state: &ToggleState| {
                    vec![
                        (status.clone(), CacheValue::Flag(state.active)),
                        (count.clone(), CacheValue::Count(state.count)),
                    ]
                },
            )
            .await
    }

    /// Toggle whether the viewer follows a user.
    ///
    /// Fire-and-forget on the wire: the server returns no state pair, so
    /// the optimistic values stand until the stale refetch reconciles them.
    /// Returns the new follow status.
    pub async fn toggle_follow(&self, target_id: u64) -> Result<bool, MutationError> {
        let viewer = self.require_viewer()?;
        let status = CacheKey::FollowStatus { user_id: target_id };
        let counts = CacheKey::FollowCounts { user_id: target_id };

        let following = !self
            .engine
            .store()
            .read(&status)
            .and_then(|v| v.as_flag())
            .unwrap_or(false);

        self.engine
            .run(
                MutationId::ToggleFollow {
                    follower_id: viewer.user_id,
                    target_id,
                },
                vec![status.clone(), counts.clone()],
                |snapshot| {
                    let mut writes = vec![(status.clone(), CacheValue::Flag(following))];
                    // Adjust the target's follower count alongside the
                    // status so the pair stays coherent.
                    if let Some(CacheValue::FollowCounts {
                        followers,
                        following: target_following,
                    }) = snapshot.get(&counts)
                    {
                        let followers = if following {
                            followers + 1
                        } else {
                            followers.saturating_sub(1)
                        };
                        writes.push((
                            counts.clone(),
                            CacheValue::FollowCounts {
                                followers,
                                following: *target_following,
                            },
                        ));
                    }
                    writes
                },
                self.api.set_follow(target_id, following),
                |_| Vec::new(),
            )
            .await?;

        Ok(following)
    }

    /// Create a comment, appended optimistically to the last known page.
    pub async fn create_comment(
        &self,
        post_id: u64,
        content: impl Into<String>,
    ) -> Result<Comment, MutationError> {
        let viewer = self.require_viewer()?;
        let content = content.into();
        let thread_key = CacheKey::Comments { post_id };
        let count_key = CacheKey::CommentCount { post_id };

        let provisional = Comment {
            id: PROVISIONAL_COMMENT_ID,
            author_id: viewer.user_id,
            content: content.clone(),
            is_deleted: false,
            created_at: Utc::now(),
        };

        let store = Arc::clone(self.engine.store());
        self.engine
            .run(
                MutationId::CreateComment { post_id },
                vec![thread_key.clone(), count_key.clone()],
                |snapshot| {
                    let mut thread = snapshot.comments(&thread_key).cloned().unwrap_or_default();
                    thread.push_comment(provisional.clone());
                    let mut writes = vec![(thread_key.clone(), CacheValue::Comments(thread))];
                    if let Some(count) = snapshot.count(&count_key) {
                        writes.push((count_key.clone(), CacheValue::Count(count + 1)));
                    }
                    writes
                },
                self.api.create_comment(post_id, &content),
                |created: &Comment| {
                    // Swap the provisional entry for the server's comment.
                    let mut thread = read_thread(&store, &thread_key);
                    thread.edit_comment(PROVISIONAL_COMMENT_ID, |c| *c = created.clone());
                    vec![(thread_key.clone(), CacheValue::Comments(thread))]
                },
            )
            .await
    }

    /// Update a comment's content in place.
    pub async fn update_comment(
        &self,
        post_id: u64,
        comment_id: u64,
        content: impl Into<String>,
    ) -> Result<Comment, MutationError> {
        self.require_viewer()?;
        let content = content.into();
        let thread_key = CacheKey::Comments { post_id };

        let store = Arc::clone(self.engine.store());
        self.engine
            .run(
                MutationId::UpdateComment {
                    post_id,
                    comment_id,
                },
                vec![thread_key.clone()],
                |snapshot| {
                    let mut thread = snapshot.comments(&thread_key).cloned().unwrap_or_default();
                    thread.edit_comment(comment_id, |c| c.content = content.clone());
                    vec![(thread_key.clone(), CacheValue::Comments(thread))]
                },
                self.api.update_comment(comment_id, &content),
                |updated: &Comment| {
                    let mut thread = read_thread(&store, &thread_key);
                    thread.edit_comment(comment_id, |c| *c = updated.clone());
                    vec![(thread_key.clone(), CacheValue::Comments(thread))]
                },
            )
            .await
    }

    /// Delete a comment.
    ///
    /// The entry is never removed from the thread; its content is replaced
    /// with the deletion placeholder and flagged, so floor numbering holds.
    pub async fn delete_comment(
        &self,
        post_id: u64,
        comment_id: u64,
    ) -> Result<(), MutationError> {
        self.require_viewer()?;
        let thread_key = CacheKey::Comments { post_id };

        self.engine
            .run(
                MutationId::DeleteComment {
                    post_id,
                    comment_id,
                },
                vec![thread_key.clone()],
                |snapshot| {
                    let mut thread = snapshot.comments(&thread_key).cloned().unwrap_or_default();
                    thread.edit_comment(comment_id, |c| {
                        c.content = COMMENT_DELETED_PLACEHOLDER.to_string();
                        c.is_deleted = true;
                    });
                    vec![(thread_key.clone(), CacheValue::Comments(thread))]
                },
                self.api.delete_comment(comment_id),
                |_| Vec::new(),
            )
            .await
    }
}

/// Flip a status key and adjust its paired count in one optimistic batch.
fn toggle_writes(
    snapshot: &Snapshot,
    status: &CacheKey,
    count: &CacheKey,
) -> Vec<(CacheKey, CacheValue)> {
    let active = snapshot.flag(status).unwrap_or(false);
    let current = snapshot.count(count).unwrap_or(0);
    let next = !active;
    let next_count = if next {
        current + 1
    } else {
        current.saturating_sub(1)
    };
    vec![
        (status.clone(), CacheValue::Flag(next)),
        (count.clone(), CacheValue::Count(next_count)),
    ]
}

fn read_thread(store: &CacheStore, key: &CacheKey) -> CommentThread {
    store
        .read(key)
        .and_then(|v| v.as_comments().cloned())
        .unwrap_or_default()
}
