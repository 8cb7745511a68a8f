//! HTTP client for the user REST endpoints.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use daterr_core::{ChatMessage, ConversationId};

use crate::error::ClientError;
use crate::models::{Conversation, ConversationList, HistoryResponse};

/// Default base URL of the user API.
pub const DEFAULT_API_URL: &str = "http://localhost:4000";

/// HTTP client for REST API endpoints.
pub struct HttpClient {
    inner: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client. `token` is sent as a bearer token.
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            inner: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Base URL requests are made against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the caller's conversations.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ClientError> {
        let list: ConversationList = self.get_json("/v1/user/getconversations").await?;
        Ok(list.into_vec())
    }

    /// Load the message backlog of a conversation, oldest first.
    pub async fn fetch_history(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<ChatMessage>, ClientError> {
        let path = format!("/v1/user/chats/{}", conversation_id);
        let response: HistoryResponse = self.get_json(&path).await?;

        let messages: Vec<ChatMessage> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.into_chat_message(conversation_id))
            .collect();
        debug!(
            conversation_id = %conversation_id,
            count = messages.len(),
            "Fetched history"
        );
        Ok(messages)
    }

    /// Get JSON from an endpoint.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET request");

        let mut request = self.inner.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), path, "Request failed");
            return Err(ClientError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ClientError::Serialization(e.to_string()))
    }
}
