//! Streaming writing-assistant sessions for the Quill client.
//!
//! One assistant invocation at a time per manager: `generate` resets the
//! session and starts a stream, incremental deltas grow the suggestion,
//! `retry` replays the last invocation, `apply_suggestion` hands the text
//! to the caller and closes. Session state is local and ephemeral; it never
//! touches the shared cache store.

mod backend;
mod error;
mod prompt;
mod session;

pub use backend::{AssistBackend, AssistEvent};
pub use error::AssistError;
pub use prompt::build_prompt;
pub use session::{AssistAction, AssistManager, AssistSession};
