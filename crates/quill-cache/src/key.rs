//! Structured cache keys.

use std::fmt;

/// Identifier addressing one cached value.
///
/// Keys are structured tuples rather than strings so that the action layer
/// and the invalidation graph cannot drift apart on formatting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Whether the viewer has bookmarked a post.
    BookmarkStatus { post_id: u64 },
    /// Bookmark count of a post.
    BookmarkCount { post_id: u64 },
    /// Whether the viewer has liked a post.
    LikeStatus { post_id: u64 },
    /// Like count of a post.
    LikeCount { post_id: u64 },
    /// Whether the viewer follows a user.
    FollowStatus { user_id: u64 },
    /// Follower/following counts of a user.
    FollowCounts { user_id: u64 },
    /// Follower list of a user.
    Followers { user_id: u64 },
    /// Following list of a user.
    Following { user_id: u64 },
    /// Comment thread of a post.
    Comments { post_id: u64 },
    /// Comment count of a post.
    CommentCount { post_id: u64 },
    /// Posts a user has bookmarked.
    BookmarkedPosts { user_id: u64 },
    /// Posts a user has liked.
    LikedPosts { user_id: u64 },
    /// The viewer's notification list.
    Notifications,
    /// The viewer's unread notification count.
    UnreadCount,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BookmarkStatus { post_id } => write!(f, "bookmark-status:{post_id}"),
            Self::BookmarkCount { post_id } => write!(f, "bookmark-count:{post_id}"),
            Self::LikeStatus { post_id } => write!(f, "like-status:{post_id}"),
            Self::LikeCount { post_id } => write!(f, "like-count:{post_id}"),
            Self::FollowStatus { user_id } => write!(f, "follow-status:{user_id}"),
            Self::FollowCounts { user_id } => write!(f, "follow-counts:{user_id}"),
            Self::Followers { user_id } => write!(f, "followers:{user_id}"),
            Self::Following { user_id } => write!(f, "following:{user_id}"),
            Self::Comments { post_id } => write!(f, "comments:{post_id}"),
            Self::CommentCount { post_id } => write!(f, "comment-count:{post_id}"),
            Self::BookmarkedPosts { user_id } => write!(f, "bookmarked-posts:{user_id}"),
            Self::LikedPosts { user_id } => write!(f, "liked-posts:{user_id}"),
            Self::Notifications => write!(f, "notifications"),
            Self::UnreadCount => write!(f, "unread-count"),
        }
    }
}
