//! Daterr Core Chat Types
//!
//! This crate contains pure chat domain types with no dependencies on:
//! - Network/WebSocket
//! - HTTP
//! - Runtime specifics
//!
//! Everything that crosses the wire or is shown to the UI is defined here.

pub mod envelope;
pub mod error;
pub mod history;
pub mod ids;
pub mod message;
pub mod status;
pub mod typing;

// Re-export commonly used types
pub use envelope::{Envelope, EnvelopeBody, TYPING_CONTENT};
pub use error::{CoreError, ParseError};
pub use history::MessageHistory;
pub use ids::{ConversationId, SessionId, UserId};
pub use message::{validate_content, ChatMessage, MessageKind, MAX_CONTENT_CHARS};
pub use status::ConnectionState;
pub use typing::TypingState;
