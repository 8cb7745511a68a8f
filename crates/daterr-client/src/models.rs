//! Wire models for the user API.
//!
//! The backend is loose about field names, so the history DTO accepts the
//! spellings it has been seen to emit and normalizes them into core types.

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};

use daterr_core::{ChatMessage, ConversationId, MessageKind, UserId};

/// Other side of a conversation, as listed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

/// Conversation summary from `GET /v1/user/getconversations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<HistoryMessage>,
    #[serde(default)]
    pub unread_count: u32,
}

impl Conversation {
    /// Participants other than `user`.
    pub fn peers<'a>(&'a self, user: &'a UserId) -> impl Iterator<Item = &'a Participant> + 'a {
        self.participants.iter().filter(move |p| &p.id != user)
    }
}

/// The endpoint has returned both a bare array and a wrapped object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ConversationList {
    Bare(Vec<Conversation>),
    Wrapped { conversations: Vec<Conversation> },
}

impl ConversationList {
    pub(crate) fn into_vec(self) -> Vec<Conversation> {
        match self {
            ConversationList::Bare(list) => list,
            ConversationList::Wrapped { conversations } => conversations,
        }
    }
}

/// Body of `GET /v1/user/chats/{id}`.
#[derive(Debug, Deserialize)]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub messages: Option<Vec<HistoryMessage>>,
}

/// One backlog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    #[serde(default, alias = "sender_id", alias = "senderId")]
    pub sender: UserId,
    #[serde(default, rename = "chatId", alias = "chat_id")]
    pub chat_id: ConversationId,
    #[serde(default, alias = "message")]
    pub content: String,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<i64>,
    /// Row creation time; stands in when `timestamp` is absent.
    #[serde(
        default,
        alias = "createdAt",
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<i64>,
    #[serde(default, rename = "type")]
    pub kind: MessageKind,
}

impl HistoryMessage {
    /// Send time in epoch seconds, falling back to the row creation time.
    pub fn sent_at(&self) -> Option<i64> {
        self.timestamp.or(self.created_at)
    }

    /// Convert to a history entry. Entries without a chat id are attributed
    /// to `conversation`; a missing timestamp becomes 0.
    pub fn into_chat_message(self, conversation: &ConversationId) -> ChatMessage {
        let timestamp = self.sent_at().unwrap_or_default();
        let conversation_id = if self.chat_id.is_empty() {
            conversation.clone()
        } else {
            self.chat_id
        };
        ChatMessage::new(self.kind, self.sender, conversation_id, self.content)
            .with_timestamp(timestamp)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Accept epoch seconds as a number or numeric string, or an RFC 3339 date.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawTimestamp>::deserialize(deserializer)?;
    Ok(match raw {
        None => None,
        Some(RawTimestamp::Int(secs)) => Some(secs),
        Some(RawTimestamp::Float(secs)) => Some(secs as i64),
        Some(RawTimestamp::Text(text)) => {
            let text = text.trim();
            text.parse::<i64>().ok().or_else(|| {
                DateTime::parse_from_rfc3339(text)
                    .ok()
                    .map(|dt| dt.timestamp())
            })
        }
    })
}
