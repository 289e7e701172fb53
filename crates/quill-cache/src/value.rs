//! Cached value payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder content written into a deleted comment.
///
/// Deleted comments are kept in place rather than removed: floor numbering
/// in the thread depends on entries never disappearing from the list.
pub const COMMENT_DELETED_PLACEHOLDER: &str = "该评论已删除";

/// A value held by one cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CacheValue {
    /// A boolean status (bookmarked, liked, following).
    Flag(bool),
    /// A counter (bookmark count, like count, unread count).
    Count(u64),
    /// Follower/following counts of a user.
    FollowCounts { followers: u64, following: u64 },
    /// A paginated comment thread.
    Comments(CommentThread),
    /// A list page owned by the fetch layer; cached as-is and only ever
    /// marked stale, never merged into.
    Opaque(serde_json::Value),
}

impl CacheValue {
    /// The boolean payload, if this is a `Flag`.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(v) => Some(*v),
            _ => None,
        }
    }

    /// The counter payload, if this is a `Count`.
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::Count(v) => Some(*v),
            _ => None,
        }
    }

    /// The comment thread payload, if present.
    pub fn as_comments(&self) -> Option<&CommentThread> {
        match self {
            Self::Comments(v) => Some(v),
            _ => None,
        }
    }
}

/// A single comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub author_id: u64,
    pub content: String,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// One fetched page of a comment thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    /// Cursor for the next page, if the server reported one.
    pub cursor: Option<String>,
}

/// The paginated comment collection for one post.
///
/// Pages accumulate in fetch order. Optimistic mutations transform this
/// collection in place; rollback restores the prior collection verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentThread {
    pub pages: Vec<CommentPage>,
}

impl CommentThread {
    /// Append a comment to the last known page, creating one if the thread
    /// has no pages yet.
    pub fn push_comment(&mut self, comment: Comment) {
        if self.pages.is_empty() {
            self.pages.push(CommentPage::default());
        }
        // Safe: just ensured non-empty.
        if let Some(last) = self.pages.last_mut() {
            last.comments.push(comment);
        }
    }

    /// Find a comment by id across all pages.
    pub fn find(&self, comment_id: u64) -> Option<&Comment> {
        self.pages
            .iter()
            .flat_map(|p| p.comments.iter())
            .find(|c| c.id == comment_id)
    }

    /// Apply `edit` to the comment with the given id, in place.
    ///
    /// Returns false if no comment with that id exists in any page.
    pub fn edit_comment(&mut self, comment_id: u64, edit: impl FnOnce(&mut Comment)) -> bool {
        for page in &mut self.pages {
            if let Some(comment) = page.comments.iter_mut().find(|c| c.id == comment_id) {
                edit(comment);
                return true;
            }
        }
        false
    }

    /// Total number of comments across pages, deleted entries included.
    pub fn len(&self) -> usize {
        self.pages.iter().map(|p| p.comments.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: u64, content: &str) -> Comment {
        Comment {
            id,
            author_id: 1,
            content: content.to_string(),
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn push_creates_first_page() {
        let mut thread = CommentThread::default();
        thread.push_comment(comment(1, "hello"));
        assert_eq!(thread.pages.len(), 1);
        assert_eq!(thread.len(), 1);
    }

    #[test]
    fn push_appends_to_last_page() {
        let mut thread = CommentThread {
            pages: vec![
                CommentPage {
                    comments: vec![comment(1, "a")],
                    cursor: Some("p2".to_string()),
                },
                CommentPage {
                    comments: vec![comment(2, "b")],
                    cursor: None,
                },
            ],
        };
        thread.push_comment(comment(3, "c"));
        assert_eq!(thread.pages[0].comments.len(), 1);
        assert_eq!(thread.pages[1].comments.len(), 2);
    }

    #[test]
    fn edit_finds_across_pages() {
        let mut thread = CommentThread {
            pages: vec![
                CommentPage {
                    comments: vec![comment(1, "a")],
                    cursor: None,
                },
                CommentPage {
                    comments: vec![comment(2, "b")],
                    cursor: None,
                },
            ],
        };
        let edited = thread.edit_comment(2, |c| c.content = "edited".to_string());
        assert!(edited);
        assert_eq!(thread.find(2).map(|c| c.content.as_str()), Some("edited"));
        assert!(!thread.edit_comment(99, |_| {}));
    }
}
