//! HTTP collaborator contract consumed by the action layer.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::MutationError;
use crate::value::Comment;

/// Uniform response envelope used by every endpoint.
///
/// A `success: false` envelope is treated identically to a transport-level
/// failure by the mutation engine.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    // No `default` attributes: serde treats a missing Option field as None
    // already, and a `default` on `data` would put a `T: Default` bound on
    // the derived impl that payload types have no reason to satisfy.
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload, converting logical failure into
    /// [`MutationError::Service`].
    pub fn into_data(self) -> Result<T, MutationError> {
        if !self.success {
            return Err(MutationError::Service(
                self.message.unwrap_or_else(|| "request failed".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| MutationError::Service("missing response data".to_string()))
    }

    /// Check `success` and discard the payload, for fire-and-forget
    /// endpoints.
    pub fn ack(self) -> Result<(), MutationError> {
        if !self.success {
            return Err(MutationError::Service(
                self.message.unwrap_or_else(|| "request failed".to_string()),
            ));
        }
        Ok(())
    }
}

/// Authoritative state returned by toggle endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ToggleState {
    /// New status (bookmarked / liked).
    pub active: bool,
    /// New count.
    pub count: u64,
}

/// The platform's REST surface, owned externally.
///
/// The engine only depends on this contract; transports are a collaborator
/// concern. Follow is fire-and-forget: the server returns no state pair.
#[async_trait]
pub trait SocialApi: Send + Sync {
    async fn toggle_bookmark(&self, post_id: u64) -> Result<ToggleState, MutationError>;

    async fn toggle_like(&self, post_id: u64) -> Result<ToggleState, MutationError>;

    async fn set_follow(&self, target_id: u64, follow: bool) -> Result<(), MutationError>;

    async fn create_comment(&self, post_id: u64, content: &str)
    -> Result<Comment, MutationError>;

    async fn update_comment(
        &self,
        comment_id: u64,
        content: &str,
    ) -> Result<Comment, MutationError>;

    async fn delete_comment(&self, comment_id: u64) -> Result<(), MutationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_yields_data() {
        let env: ApiEnvelope<ToggleState> = serde_json::from_str(
            r#"{"success": true, "data": {"active": true, "count": 6}}"#,
        )
        .unwrap();
        let state = env.into_data().unwrap();
        assert!(state.active);
        assert_eq!(state.count, 6);
    }

    #[test]
    fn failure_envelope_surfaces_message() {
        let env: ApiEnvelope<ToggleState> =
            serde_json::from_str(r#"{"success": false, "message": "must be signed in"}"#).unwrap();
        match env.into_data() {
            Err(MutationError::Service(msg)) => assert_eq!(msg, "must be signed in"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn envelope_deserializes_for_non_default_payloads() {
        // Comment has no Default impl; the envelope must not require one,
        // and a missing data field must come through as None.
        let env: ApiEnvelope<crate::value::Comment> =
            serde_json::from_str(r#"{"success": false, "message": "gone"}"#).unwrap();
        assert!(env.data.is_none());
        assert_eq!(env.message.as_deref(), Some("gone"));
    }

    #[test]
    fn failure_envelope_without_message_gets_fallback() {
        let env: ApiEnvelope<ToggleState> = serde_json::from_str(r#"{"success": false}"#).unwrap();
        match env.into_data() {
            Err(MutationError::Service(msg)) => assert_eq!(msg, "request failed"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
