//! Static invalidation graph for settled mutations.
//!
//! After a mutation settles (committed or rolled back), its dependent keys
//! are marked stale so the next read refetches and reconciles any drift
//! between the optimistic guess and true server state.

use crate::key::CacheKey;

/// The named mutations the engine knows how to settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationId {
    ToggleBookmark { post_id: u64, user_id: u64 },
    ToggleLike { post_id: u64, user_id: u64 },
    ToggleFollow { follower_id: u64, target_id: u64 },
    CreateComment { post_id: u64 },
    UpdateComment { post_id: u64, comment_id: u64 },
    DeleteComment { post_id: u64, comment_id: u64 },
}

/// The set of keys that must be marked stale once a mutation settles.
///
/// Target keys of the mutation are included: the optimistic value stays on
/// screen, but the next read re-verifies it against the server.
pub fn dependents(mutation: &MutationId) -> Vec<CacheKey> {
    match *mutation {
        MutationId::ToggleBookmark { post_id, user_id } => vec![
            CacheKey::BookmarkStatus { post_id },
            CacheKey::BookmarkCount { post_id },
            CacheKey::BookmarkedPosts { user_id },
        ],
        MutationId::ToggleLike { post_id, user_id } => vec![
            CacheKey::LikeStatus { post_id },
            CacheKey::LikeCount { post_id },
            CacheKey::LikedPosts { user_id },
        ],
        MutationId::ToggleFollow {
            follower_id,
            target_id,
        } => vec![
            CacheKey::FollowStatus { user_id: target_id },
            CacheKey::FollowCounts { user_id: follower_id },
            CacheKey::FollowCounts { user_id: target_id },
            CacheKey::Following { user_id: follower_id },
            CacheKey::Followers { user_id: target_id },
        ],
        MutationId::CreateComment { post_id }
        | MutationId::UpdateComment { post_id, .. }
        | MutationId::DeleteComment { post_id, .. } => vec![
            CacheKey::Comments { post_id },
            CacheKey::CommentCount { post_id },
        ],
    }
}
