//! Error types for the realtime channel.

use thiserror::Error;

/// Errors that can occur on the notification channel.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Reconnection attempts exhausted.
    #[error("gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
}
