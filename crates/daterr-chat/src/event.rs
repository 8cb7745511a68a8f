//! Session events and snapshots consumed by the UI layer.

use std::time::Duration;

use tokio::sync::oneshot;

use daterr_core::{ChatMessage, ConnectionState, ConversationId, TypingState, UserId};

use crate::error::SendError;

/// Events sent from the session to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Connection state changed.
    ConnectionChanged(ConnectionState),
    /// Transient transport failure; the session keeps retrying.
    ConnectionError { message: String },
    /// A reconnect attempt is scheduled.
    ReconnectScheduled { attempt: u32, retry_in: Duration },
    /// A message or system entry was appended to history.
    MessageReceived(ChatMessage),
    /// Remote typing indicator changed.
    TypingChanged(TypingState),
    /// A REST backlog was merged into history.
    HistorySeeded { total: usize, duplicates: usize },
}

/// Point-in-time copy of a session's state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub conversation_id: ConversationId,
    pub local_user_id: UserId,
    pub connection: ConnectionState,
    pub typing: TypingState,
    pub history: Vec<ChatMessage>,
    /// Most recent transport failure; cleared once the socket reopens.
    pub last_error: Option<String>,
    /// Whether a `typing` frame is currently considered active for the peer.
    pub local_typing: bool,
}

/// Commands sent from the session handle to its actor.
#[derive(Debug)]
pub(crate) enum Command {
    Send {
        text: String,
        reply: oneshot::Sender<Result<(), SendError>>,
    },
    Typing {
        draft: String,
    },
    Seed {
        messages: Vec<ChatMessage>,
    },
    Close,
}

/// Helper to create a reconnect event.
pub fn reconnect_event(attempt: u32, retry_in: Duration) -> SessionEvent {
    SessionEvent::ReconnectScheduled { attempt, retry_in }
}
