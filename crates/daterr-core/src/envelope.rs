//! Wire envelope exchanged over the chat socket.
//!
//! Every frame is a JSON object tagged by `type`:
//!
//! ```json
//! { "type": "message", "sender": "u2", "chatId": "c1", "content": "hi", "timestamp": 1000 }
//! ```
//!
//! Unknown tags decode to [`Envelope::Unknown`] so newer servers can add
//! frame types without breaking older clients.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::ids::{ConversationId, UserId};
use crate::message::{ChatMessage, MessageKind};

/// Content carried by outbound typing frames. The backend expects it.
pub const TYPING_CONTENT: &str = "Typing...";

/// Tagged chat frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// A participant message.
    Message(EnvelopeBody),
    /// A backend-generated message.
    System(EnvelopeBody),
    /// Sender started composing.
    Typing(EnvelopeBody),
    /// Sender stopped composing.
    StopTyping(EnvelopeBody),
    /// Any tag this client does not understand.
    #[serde(other)]
    Unknown,
}

/// Fields shared by every envelope type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeBody {
    #[serde(default)]
    pub sender: UserId,
    #[serde(default, rename = "chatId")]
    pub chat_id: ConversationId,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl EnvelopeBody {
    fn new(sender: &UserId, chat_id: &ConversationId, content: String, timestamp: i64) -> Self {
        Self {
            sender: sender.clone(),
            chat_id: chat_id.clone(),
            content,
            timestamp: Some(timestamp),
        }
    }
}

impl Envelope {
    /// Decode one text frame.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Decode one binary frame.
    pub fn parse_bytes(raw: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(raw).map_err(|_| ParseError::NotUtf8)?;
        Self::parse(text)
    }

    /// Encode as a text frame.
    pub fn to_json(&self) -> String {
        // Serializing string-keyed structs to a String cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Build an outbound `message` frame.
    pub fn message(
        sender: &UserId,
        chat_id: &ConversationId,
        content: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self::Message(EnvelopeBody::new(sender, chat_id, content.into(), timestamp))
    }

    /// Build an outbound `typing` frame.
    pub fn typing(sender: &UserId, chat_id: &ConversationId, timestamp: i64) -> Self {
        Self::Typing(EnvelopeBody::new(
            sender,
            chat_id,
            TYPING_CONTENT.to_string(),
            timestamp,
        ))
    }

    /// Build an outbound `stop_typing` frame.
    pub fn stop_typing(sender: &UserId, chat_id: &ConversationId, timestamp: i64) -> Self {
        Self::StopTyping(EnvelopeBody::new(
            sender,
            chat_id,
            TYPING_CONTENT.to_string(),
            timestamp,
        ))
    }

    /// Wire name of this frame type.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::System(_) => "system",
            Self::Typing(_) => "typing",
            Self::StopTyping(_) => "stop_typing",
            Self::Unknown => "unknown",
        }
    }

    /// Shared fields, if this is a known frame type.
    pub fn body(&self) -> Option<&EnvelopeBody> {
        match self {
            Self::Message(body) | Self::System(body) | Self::Typing(body) | Self::StopTyping(body) => {
                Some(body)
            }
            Self::Unknown => None,
        }
    }

    /// Convert a `message` or `system` frame into a history entry.
    ///
    /// Frames without a timestamp are stamped with `received_at`.
    pub fn into_chat_message(self, received_at: i64) -> Option<ChatMessage> {
        let (kind, body) = match self {
            Self::Message(body) => (MessageKind::Message, body),
            Self::System(body) => (MessageKind::System, body),
            _ => return None,
        };
        Some(ChatMessage {
            sender_id: body.sender,
            conversation_id: body.chat_id,
            content: body.content,
            timestamp: body.timestamp.unwrap_or(received_at),
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_parse_message_frame() {
        let raw = r#"{"type":"message","sender":"u2","chatId":"c1","content":"hi","timestamp":1000}"#;
        let envelope = Envelope::parse(raw).unwrap();

        let msg = envelope.into_chat_message(5).unwrap();
        assert_eq!(msg.sender_id, UserId::from("u2"));
        assert_eq!(msg.conversation_id, ConversationId::from("c1"));
        assert_eq!(msg.content, "hi");
        assert_eq!(msg.timestamp, 1000);
        assert_eq!(msg.kind, MessageKind::Message);
    }

    #[test]
    fn test_system_frame_without_timestamp_uses_receipt_time() {
        let raw = r#"{"type":"system","content":"You matched!"}"#;
        let msg = Envelope::parse(raw).unwrap().into_chat_message(42).unwrap();

        assert_eq!(msg.kind, MessageKind::System);
        assert_eq!(msg.timestamp, 42);
        assert!(msg.sender_id.is_empty());
    }

    #[test]
    fn test_unknown_tag_is_not_an_error() {
        let raw = r#"{"type":"read_receipt","sender":"u2","chatId":"c1"}"#;
        assert_eq!(Envelope::parse(raw).unwrap(), Envelope::Unknown);
    }

    #[test]
    fn test_malformed_frames() {
        assert!(Envelope::parse("not json").is_err());
        assert!(Envelope::parse(r#"{"sender":"u2"}"#).is_err());
        assert!(Envelope::parse(r#"[1,2,3]"#).is_err());
        assert!(matches!(
            Envelope::parse_bytes(&[0xff, 0xfe]),
            Err(ParseError::NotUtf8)
        ));
    }

    #[test]
    fn test_outbound_typing_shape() {
        let frame = Envelope::typing(&UserId::from("u1"), &ConversationId::from("c1"), 1700);
        let value: Value = serde_json::from_str(&frame.to_json()).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "typing",
                "sender": "u1",
                "chatId": "c1",
                "content": "Typing...",
                "timestamp": 1700
            })
        );
    }

    #[test]
    fn test_stop_typing_tag() {
        let frame = Envelope::stop_typing(&UserId::from("u1"), &ConversationId::from("c1"), 1);
        let value: Value = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(value["type"], "stop_typing");
        assert_eq!(frame.kind_name(), "stop_typing");
    }

    #[test]
    fn test_typing_frame_is_not_a_history_entry() {
        let frame = Envelope::typing(&UserId::from("u2"), &ConversationId::from("c1"), 1);
        assert!(frame.into_chat_message(1).is_none());
    }
}
