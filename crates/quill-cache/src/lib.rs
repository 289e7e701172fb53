//! Reactive cache and optimistic mutation engine for the Quill client.
//!
//! This crate owns the client-held copy of server state and keeps it
//! consistent under concurrent, possibly-failing asynchronous operations:
//!
//! - **Cache Store**: keyed table of values with staleness flags and
//!   per-key subscriber notification
//! - **Mutation Engine**: optimistic-apply with snapshot-based rollback
//!   and post-settle invalidation
//! - **Invalidation Graph**: static mapping from committed mutations to
//!   the cache keys that must be refetched afterward
//! - **Action layer**: the bookmark/like/follow toggles and comment
//!   mutations built on top of the engine

mod actions;
mod api;
mod engine;
mod error;
mod invalidation;
mod key;
mod rest;
mod store;
mod value;

pub use actions::{SocialActions, Viewer};
pub use api::{ApiEnvelope, SocialApi, ToggleState};
pub use engine::{MutationEngine, MutationRecord, MutationStatus, Snapshot};
pub use error::MutationError;
pub use invalidation::{MutationId, dependents};
pub use key::CacheKey;
pub use rest::RestClient;
pub use store::{CacheEvent, CacheStore, Subscription};
pub use value::{COMMENT_DELETED_PLACEHOLDER, CacheValue, Comment, CommentPage, CommentThread};
