//! Default REST implementation of the [`SocialApi`] collaborator.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{ApiEnvelope, SocialApi, ToggleState};
use crate::error::MutationError;
use crate::value::Comment;

#[derive(Serialize)]
struct CommentBody<'a> {
    content: &'a str,
}

/// Thin REST client speaking the platform's envelope contract.
pub struct RestClient {
    http: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl RestClient {
    /// Create a new client for the given API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            token: RwLock::new(None),
        }
    }

    /// Set or clear the bearer token attached to every request.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().expect("token lock poisoned") = token;
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token.read().expect("token lock poisoned").as_deref() {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<ApiEnvelope<T>, MutationError> {
        let response = self.authorized(builder).send().await?;
        debug!(status = %response.status(), "api response");
        let envelope = response.error_for_status()?.json::<ApiEnvelope<T>>().await?;
        Ok(envelope)
    }
}

#[async_trait]
impl SocialApi for RestClient {
    async fn toggle_bookmark(&self, post_id: u64) -> Result<ToggleState, MutationError> {
        let url = format!("{}/api/posts/{}/bookmark", self.base_url, post_id);
        self.send::<ToggleState>(self.http.post(&url))
            .await?
            .into_data()
    }

    async fn toggle_like(&self, post_id: u64) -> Result<ToggleState, MutationError> {
        let url = format!("{}/api/posts/{}/like", self.base_url, post_id);
        self.send::<ToggleState>(self.http.post(&url))
            .await?
            .into_data()
    }

    async fn set_follow(&self, target_id: u64, follow: bool) -> Result<(), MutationError> {
        let url = format!("{}/api/users/{}/follow", self.base_url, target_id);
        let builder = if follow {
            self.http.post(&url)
        } else {
            self.http.delete(&url)
        };
        self.send::<serde_json::Value>(builder).await?.ack()
    }

    async fn create_comment(
        &self,
        post_id: u64,
        content: &str,
    ) -> Result<Comment, MutationError> {
        let url = format!("{}/api/posts/{}/comments", self.base_url, post_id);
        self.send::<Comment>(self.http.post(&url).json(&CommentBody { content }))
            .await?
            .into_data()
    }

    async fn update_comment(
        &self,
        comment_id: u64,
        content: &str,
    ) -> Result<Comment, MutationError> {
        let url = format!("{}/api/comments/{}", self.base_url, comment_id);
        self.send::<Comment>(self.http.put(&url).json(&CommentBody { content }))
            .await?
            .into_data()
    }

    async fn delete_comment(&self, comment_id: u64) -> Result<(), MutationError> {
        let url = format!("{}/api/comments/{}", self.base_url, comment_id);
        self.send::<serde_json::Value>(self.http.delete(&url))
            .await?
            .ack()
    }
}
