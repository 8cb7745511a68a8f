//! Chat session configuration.

use std::time::Duration;

use url::Url;

use daterr_core::{ConversationId, UserId, MAX_CONTENT_CHARS};

use crate::backoff::ReconnectPolicy;

/// Chat session configuration.
///
/// Identity and credentials are always passed in here; the session never
/// reads them from the environment.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Chat socket endpoint, without query string.
    pub endpoint: String,

    /// Bearer token sent on the handshake, if any.
    pub auth_token: Option<String>,

    /// Delay strategy after a lost or failed connection.
    pub reconnect: ReconnectPolicy,

    /// Give up on a handshake after this long and schedule a reconnect.
    pub connect_timeout: Duration,

    /// Upper bound on the closing handshake when the session is disposed.
    pub close_timeout: Duration,

    /// Lifetime of a typing indicator without a refresh or `stop_typing`.
    pub typing_timeout: Duration,

    /// Maximum characters per outbound message.
    pub max_content_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:4000/v1/chat/ws".to_string(),
            auth_token: None,
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(5),
            typing_timeout: Duration::from_secs(3),
            max_content_chars: MAX_CONTENT_CHARS,
        }
    }
}

impl SessionConfig {
    /// Create a config for the given endpoint with default timings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Set the bearer token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the reconnect policy.
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Socket URL for one conversation.
    pub fn socket_url(
        &self,
        user: &UserId,
        conversation: &ConversationId,
    ) -> Result<String, url::ParseError> {
        let mut url = Url::parse(&self.endpoint)?;
        url.query_pairs_mut()
            .append_pair("userId", user.as_str())
            .append_pair("matchId", conversation.as_str());
        Ok(url.to_string())
    }
}
