//! Streaming collaborator contract.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::AssistError;

/// One event from the assistant stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistEvent {
    /// Incremental output. `text` is the cumulative assistant text so far,
    /// not an increment to append.
    Delta { text: String },
    /// The stream finished cleanly.
    Done,
    /// The stream failed; no further events follow.
    Error { message: String },
}

/// The external streaming collaborator.
///
/// A request carries a single natural-language instruction; the response is
/// a sequence of [`AssistEvent`]s terminated by `Done` or `Error`.
#[async_trait]
pub trait AssistBackend: Send + Sync {
    /// Start one streaming invocation for the given prompt.
    async fn stream(&self, prompt: &str) -> Result<mpsc::Receiver<AssistEvent>, AssistError>;
}
