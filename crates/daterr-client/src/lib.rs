//! REST client for the Daterr user API.
//!
//! Lists conversations and loads a conversation's message backlog, which
//! the chat session merges into its live history.

pub mod error;
pub mod http;
pub mod models;

pub use error::ClientError;
pub use http::{HttpClient, DEFAULT_API_URL};
pub use models::{Conversation, HistoryMessage, Participant};
