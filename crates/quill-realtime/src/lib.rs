//! WebSocket notification channel for the Quill client.
//!
//! Maintains one persistent push connection per authenticated session and
//! reconciles inbound messages into the shared cache store: unread-count
//! frames are written directly, notification frames mark the list stale so
//! the fetch layer refetches on next read.

mod channel;
mod error;
mod message;

pub use channel::{ConnectionState, NotificationChannel, RealtimeConfig};
pub use error::RealtimeError;
pub use message::{PushMessage, decode_push};
