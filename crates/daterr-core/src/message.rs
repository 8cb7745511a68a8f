//! Chat message types for conversation history.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{ConversationId, UserId};

/// Maximum number of characters a user may put in one message.
pub const MAX_CONTENT_CHARS: usize = 200;

/// Kind of a history entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Message written by a participant.
    #[default]
    Message,
    /// Message generated by the backend (match notice, etc.).
    System,
}

/// A message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of this message.
    pub sender_id: UserId,
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Message content.
    pub content: String,
    /// Unix timestamp (seconds).
    pub timestamp: i64,
    /// Kind of this message.
    pub kind: MessageKind,
}

impl ChatMessage {
    /// Create a new chat message stamped with the current time.
    pub fn new(
        kind: MessageKind,
        sender_id: UserId,
        conversation_id: ConversationId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender_id,
            conversation_id,
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp(),
            kind,
        }
    }

    /// Override the timestamp.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns true for backend-generated entries.
    pub fn is_system(&self) -> bool {
        self.kind == MessageKind::System
    }

    /// Returns true if `user` wrote this message.
    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender_id == user
    }
}

/// Check user-entered text before it is sent.
pub fn validate_content(text: &str, max_chars: usize) -> Result<(), CoreError> {
    if text.trim().is_empty() {
        return Err(CoreError::EmptyContent);
    }
    let len = text.chars().count();
    if len > max_chars {
        return Err(CoreError::ContentTooLong {
            len,
            max: max_chars,
        });
    }
    Ok(())
}
