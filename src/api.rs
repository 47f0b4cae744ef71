//! REST collaborator
//!
//! The two chat endpoints of the platform gateway: conversation summaries
//! and per-conversation message history.

use crate::auth::CredentialProvider;
use crate::protocol::MessageRecord;
use crate::storage::ConversationSummary;
use crate::{Error, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Chat data served over REST
pub trait ChatApi: Send + Sync {
    /// Every conversation of the authenticated user
    fn fetch_conversation_summaries(
        &self,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>>> + Send;

    /// Full message history between two users, oldest first
    fn fetch_message_history(
        &self,
        self_id: &str,
        partner_id: &str,
    ) -> impl Future<Output = Result<Vec<MessageRecord>>> + Send;
}

/// [`ChatApi`] over HTTP with bearer authentication
pub struct RestChatApi<C> {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<C>,
}

impl<C: CredentialProvider> RestChatApi<C> {
    /// Client for the gateway at `base_url`
    pub fn new(base_url: impl Into<String>, credentials: Arc<C>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Gateway base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let token = self.credentials.bearer_token().await?;
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self.client.get(&url).bearer_auth(token).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication(format!("{} rejected the access token", path)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("{} returned {}: {}", path, status, body.trim())));
        }

        Ok(response.json::<T>().await?)
    }
}

impl<C: CredentialProvider> ChatApi for RestChatApi<C> {
    async fn fetch_conversation_summaries(&self) -> Result<Vec<ConversationSummary>> {
        self.get_json("/api/v1/chats/summary").await
    }

    async fn fetch_message_history(&self, self_id: &str, partner_id: &str) -> Result<Vec<MessageRecord>> {
        self.get_json(&format!("/api/v1/messages/{}/{}", self_id, partner_id))
            .await
    }
}
