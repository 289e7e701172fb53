//! Error types for the assistant backend.

use thiserror::Error;

/// Errors that can occur when invoking the assistant collaborator.
#[derive(Debug, Error)]
pub enum AssistError {
    /// Could not reach the streaming collaborator.
    #[error("assistant unavailable: {0}")]
    Unavailable(String),

    /// The collaborator rejected the request.
    #[error("assistant request failed: {0}")]
    Request(String),
}
