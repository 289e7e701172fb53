//! Error types for cache mutations.

use thiserror::Error;

/// Errors that can occur while running a mutation.
///
/// Transport and service failures are fully recovered locally (rollback +
/// invalidate) before they surface here, so a caller receiving one of these
/// can show a transient notification without worrying about cache state.
#[derive(Debug, Error)]
pub enum MutationError {
    /// The viewer is not authenticated. Raised before the engine is involved.
    #[error("authentication required")]
    AuthRequired,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The collaborator responded but signalled logical failure
    /// (`success: false` envelope).
    #[error("service error: {0}")]
    Service(String),
}
