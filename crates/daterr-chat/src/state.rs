//! Conversation state machine.
//!
//! `ChatState` owns connection state, history and both typing indicators. It
//! performs no I/O: the actor feeds it commands, parsed frames and the current
//! time, and writes whatever frames it returns. Timers are plain deadlines
//! that the actor sleeps on.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use daterr_core::{
    validate_content, ChatMessage, ConnectionState, ConversationId, Envelope, EnvelopeBody,
    MessageHistory, ParseError, TypingState, UserId,
};

use crate::config::SessionConfig;
use crate::error::SendError;
use crate::event::{SessionEvent, SessionSnapshot};

/// State of one conversation.
#[derive(Debug)]
pub struct ChatState {
    local_user: UserId,
    conversation: ConversationId,
    connection: ConnectionState,
    history: MessageHistory,
    typing: TypingState,
    /// When the remote indicator clears without a `stop_typing`.
    typing_expires_at: Option<Instant>,
    /// When the local typing-sent flag clears; `Some` while the flag is set.
    local_typing_until: Option<Instant>,
    last_typing_sent: Option<Instant>,
    typing_timeout: Duration,
    max_content_chars: usize,
    last_error: Option<String>,
}

impl ChatState {
    /// Create state for a conversation. Starts `Closed`.
    pub fn new(local_user: UserId, conversation: ConversationId, config: &SessionConfig) -> Self {
        Self {
            local_user,
            conversation,
            connection: ConnectionState::Closed,
            history: MessageHistory::new(),
            typing: TypingState::idle(),
            typing_expires_at: None,
            local_typing_until: None,
            last_typing_sent: None,
            typing_timeout: config.typing_timeout,
            max_content_chars: config.max_content_chars,
            last_error: None,
        }
    }

    pub fn local_user(&self) -> &UserId {
        &self.local_user
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    pub fn typing(&self) -> &TypingState {
        &self.typing
    }

    /// Whether a `typing` frame sent by us is still considered live.
    pub fn is_local_typing(&self) -> bool {
        self.local_typing_until.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Move to `next`. Returns an event if the state actually changed.
    pub fn set_connection(&mut self, next: ConnectionState) -> Option<SessionEvent> {
        if self.connection == next {
            return None;
        }
        debug!(from = %self.connection, to = %next, "Connection state transition");
        self.connection = next;

        if next.is_open() {
            self.last_error = None;
        } else {
            // Our typing frame went out on a socket that no longer exists.
            self.local_typing_until = None;
            self.last_typing_sent = None;
        }
        Some(SessionEvent::ConnectionChanged(next))
    }

    /// Remember a transport failure for the UI banner.
    pub fn record_error(&mut self, message: String) -> SessionEvent {
        self.last_error = Some(message.clone());
        SessionEvent::ConnectionError { message }
    }

    /// Validate `text` and build the frames to write for it.
    ///
    /// History is not touched: the message appears once the server echoes it.
    pub fn prepare_send(&mut self, text: &str, now_secs: i64) -> Result<Vec<Envelope>, SendError> {
        validate_content(text, self.max_content_chars)?;
        if !self.connection.is_open() {
            return Err(SendError::NotConnected);
        }

        let mut frames = Vec::with_capacity(2);
        if self.local_typing_until.take().is_some() {
            self.last_typing_sent = None;
            frames.push(Envelope::stop_typing(
                &self.local_user,
                &self.conversation,
                now_secs,
            ));
        }
        frames.push(Envelope::message(
            &self.local_user,
            &self.conversation,
            text,
            now_secs,
        ));
        Ok(frames)
    }

    /// Record a keystroke in the composer.
    ///
    /// Returns a `typing` frame on the rising edge, or when the last one is
    /// old enough that the peer's indicator would expire soon. Always re-arms
    /// the local expiry.
    pub fn prepare_typing(&mut self, draft: &str, now: Instant, now_secs: i64) -> Option<Envelope> {
        if draft.trim().is_empty() || !self.connection.is_open() {
            return None;
        }

        let refresh_after = self.typing_timeout / 2;
        let due = match (self.local_typing_until, self.last_typing_sent) {
            (Some(_), Some(sent)) => now.duration_since(sent) >= refresh_after,
            _ => true,
        };

        self.local_typing_until = Some(now + self.typing_timeout);
        if !due {
            return None;
        }

        self.last_typing_sent = Some(now);
        Some(Envelope::typing(
            &self.local_user,
            &self.conversation,
            now_secs,
        ))
    }

    /// Parse and apply one raw inbound frame.
    pub fn on_inbound_event(
        &mut self,
        raw: &str,
        now: Instant,
        now_secs: i64,
    ) -> Result<Option<SessionEvent>, ParseError> {
        let envelope = Envelope::parse(raw)?;
        Ok(self.apply_envelope(envelope, now, now_secs))
    }

    /// Apply one decoded frame.
    pub fn apply_envelope(
        &mut self,
        envelope: Envelope,
        now: Instant,
        now_secs: i64,
    ) -> Option<SessionEvent> {
        trace!(kind = envelope.kind_name(), "Inbound frame");

        if let Some(body) = envelope.body() {
            if !body.chat_id.is_empty() && body.chat_id != self.conversation {
                debug!(chat_id = %body.chat_id, "Ignoring frame for another conversation");
                return None;
            }
        }

        match envelope {
            Envelope::Message(_) | Envelope::System(_) => {
                let mut message = envelope.into_chat_message(now_secs)?;
                if message.conversation_id.is_empty() {
                    message.conversation_id = self.conversation.clone();
                }
                self.history.push(message.clone());
                Some(SessionEvent::MessageReceived(message))
            }
            Envelope::Typing(body) => self.remote_typing(body, now),
            Envelope::StopTyping(body) => self.remote_stop_typing(body),
            Envelope::Unknown => {
                debug!("Ignoring frame with unknown type");
                None
            }
        }
    }

    fn remote_typing(&mut self, body: EnvelopeBody, now: Instant) -> Option<SessionEvent> {
        if body.sender == self.local_user {
            return None;
        }
        self.typing_expires_at = Some(now + self.typing_timeout);

        let next = TypingState::typing(body.sender);
        if self.typing == next {
            return None;
        }
        self.typing = next;
        Some(SessionEvent::TypingChanged(self.typing.clone()))
    }

    fn remote_stop_typing(&mut self, body: EnvelopeBody) -> Option<SessionEvent> {
        if !self.typing.is_peer(&body.sender) {
            return None;
        }
        self.typing = TypingState::idle();
        self.typing_expires_at = None;
        Some(SessionEvent::TypingChanged(self.typing.clone()))
    }

    /// Merge a REST backlog into history.
    pub fn seed(&mut self, backlog: Vec<ChatMessage>) -> SessionEvent {
        let duplicates = self.history.merge_backlog(backlog);
        SessionEvent::HistorySeeded {
            total: self.history.len(),
            duplicates,
        }
    }

    /// Earliest pending timer, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.typing_expires_at, self.local_typing_until) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fire every timer due at `now`.
    pub fn on_deadline(&mut self, now: Instant) -> Option<SessionEvent> {
        if self.local_typing_until.is_some_and(|at| at <= now) {
            self.local_typing_until = None;
            self.last_typing_sent = None;
        }

        if self.typing_expires_at.is_some_and(|at| at <= now) {
            self.typing_expires_at = None;
            if self.typing.is_typing {
                debug!("Typing indicator expired");
                self.typing = TypingState::idle();
                return Some(SessionEvent::TypingChanged(self.typing.clone()));
            }
        }
        None
    }

    /// Dispose: cancel every timer and move to `Closed`.
    pub fn close(&mut self) -> Option<SessionEvent> {
        self.typing_expires_at = None;
        self.local_typing_until = None;
        self.last_typing_sent = None;
        self.set_connection(ConnectionState::Closed)
    }

    /// Copy of the state for the UI.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            conversation_id: self.conversation.clone(),
            local_user_id: self.local_user.clone(),
            connection: self.connection,
            typing: self.typing.clone(),
            history: self.history.to_vec(),
            last_error: self.last_error.clone(),
            local_typing: self.is_local_typing(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daterr_core::MessageKind;
    use serde_json::Value;

    fn open_state() -> ChatState {
        let mut state = ChatState::new(
            UserId::from("u1"),
            ConversationId::from("c1"),
            &SessionConfig::default(),
        );
        state.set_connection(ConnectionState::Open);
        state
    }

    fn frame(kind: &str, sender: &str, content: &str, ts: i64) -> String {
        format!(
            r#"{{"type":"{}","sender":"{}","chatId":"c1","content":"{}","timestamp":{}}}"#,
            kind, sender, content, ts
        )
    }

    fn json(envelope: &Envelope) -> Value {
        serde_json::from_str(&envelope.to_json()).unwrap()
    }

    #[test]
    fn test_history_follows_arrival_order_not_timestamps() {
        let mut state = open_state();
        let now = Instant::now();

        for (content, ts) in [("a", 300), ("b", 100), ("c", 200)] {
            state
                .on_inbound_event(&frame("message", "u2", content, ts), now, 0)
                .unwrap();
        }
        state
            .on_inbound_event(&frame("system", "", "matched", 50), now, 0)
            .unwrap();

        let contents: Vec<_> = state.history().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c", "matched"]);
        assert_eq!(state.history().last().unwrap().kind, MessageKind::System);
    }

    #[test]
    fn test_typing_symmetry() {
        let mut state = open_state();
        let now = Instant::now();

        state.on_inbound_event(&frame("typing", "p", "", 1), now, 0).unwrap();
        state.on_inbound_event(&frame("typing", "q", "", 2), now, 0).unwrap();
        let event = state
            .on_inbound_event(&frame("stop_typing", "p", "", 3), now, 0)
            .unwrap();

        assert!(event.is_none());
        assert_eq!(state.typing(), &TypingState::typing(UserId::from("q")));

        let event = state
            .on_inbound_event(&frame("stop_typing", "q", "", 4), now, 0)
            .unwrap();
        assert_eq!(event, Some(SessionEvent::TypingChanged(TypingState::idle())));
        assert_eq!(state.next_deadline(), None);
    }

    #[test]
    fn test_remote_typing_expires() {
        let mut state = open_state();
        let start = Instant::now();

        state.on_inbound_event(&frame("typing", "u2", "", 1), start, 0).unwrap();
        assert_eq!(state.next_deadline(), Some(start + Duration::from_secs(3)));

        assert!(state.on_deadline(start + Duration::from_secs(2)).is_none());
        assert!(state.typing().is_typing);

        let event = state.on_deadline(start + Duration::from_secs(3));
        assert_eq!(event, Some(SessionEvent::TypingChanged(TypingState::idle())));
        assert_eq!(state.typing().typing_peer_id, None);
        assert_eq!(state.next_deadline(), None);
    }

    #[test]
    fn test_repeated_typing_extends_expiry() {
        let mut state = open_state();
        let start = Instant::now();

        state.on_inbound_event(&frame("typing", "u2", "", 1), start, 0).unwrap();
        let later = start + Duration::from_secs(2);
        let event = state.on_inbound_event(&frame("typing", "u2", "", 2), later, 0).unwrap();

        assert!(event.is_none());
        assert!(state.on_deadline(start + Duration::from_secs(3)).is_none());
        assert!(state.typing().is_typing);
    }

    #[test]
    fn test_own_typing_echo_is_ignored() {
        let mut state = open_state();
        let event = state
            .on_inbound_event(&frame("typing", "u1", "", 1), Instant::now(), 0)
            .unwrap();
        assert!(event.is_none());
        assert!(!state.typing().is_typing);
    }

    #[test]
    fn test_frames_for_other_conversations_are_ignored() {
        let mut state = open_state();
        let raw = r#"{"type":"message","sender":"u2","chatId":"c9","content":"wrong room","timestamp":1}"#;
        assert!(state.on_inbound_event(raw, Instant::now(), 0).unwrap().is_none());
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_frame_without_chat_id_belongs_to_this_conversation() {
        let mut state = open_state();
        let raw = r#"{"type":"system","content":"You matched!","timestamp":7}"#;
        let event = state.on_inbound_event(raw, Instant::now(), 0).unwrap();

        let Some(SessionEvent::MessageReceived(message)) = event else {
            panic!("expected a message event, got {:?}", event);
        };
        assert_eq!(message.conversation_id, ConversationId::from("c1"));
        assert_eq!(
            state.history().last().unwrap().conversation_id,
            ConversationId::from("c1")
        );
    }

    #[test]
    fn test_unknown_and_malformed_frames() {
        let mut state = open_state();
        let now = Instant::now();

        let event = state
            .on_inbound_event(r#"{"type":"read_receipt","sender":"u2"}"#, now, 0)
            .unwrap();
        assert!(event.is_none());
        assert!(state.on_inbound_event("{not json", now, 0).is_err());

        // State is untouched by either frame
        state.on_inbound_event(&frame("message", "u2", "ok", 1), now, 0).unwrap();
        assert_eq!(state.history().len(), 1);
    }

    #[test]
    fn test_send_guards() {
        let mut state = ChatState::new(
            UserId::from("u1"),
            ConversationId::from("c1"),
            &SessionConfig::default(),
        );

        // Blank text wins over connection state
        assert_eq!(state.prepare_send("", 0), Err(SendError::Empty));
        assert_eq!(state.prepare_send("   ", 0), Err(SendError::Empty));
        assert_eq!(state.prepare_send("hello", 0), Err(SendError::NotConnected));

        state.set_connection(ConnectionState::Open);
        assert_eq!(
            state.prepare_send(&"x".repeat(201), 0),
            Err(SendError::TooLong { len: 201, max: 200 })
        );
    }

    #[test]
    fn test_send_builds_message_frame() {
        let mut state = open_state();
        let frames = state.prepare_send("hello", 1234).unwrap();

        assert_eq!(frames.len(), 1);
        let value = json(&frames[0]);
        assert_eq!(value["type"], "message");
        assert_eq!(value["sender"], "u1");
        assert_eq!(value["chatId"], "c1");
        assert_eq!(value["content"], "hello");
        assert_eq!(value["timestamp"], 1234);

        // No optimistic append
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_send_stops_active_typing_first() {
        let mut state = open_state();
        state.prepare_typing("hel", Instant::now(), 1).unwrap();
        assert!(state.is_local_typing());

        let frames = state.prepare_send("hello", 2).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(json(&frames[0])["type"], "stop_typing");
        assert_eq!(json(&frames[1])["type"], "message");
        assert!(!state.is_local_typing());
        assert_eq!(state.next_deadline(), None);
    }

    #[test]
    fn test_typing_is_debounced() {
        let mut state = open_state();
        let start = Instant::now();

        assert!(state.prepare_typing("h", start, 0).is_some());
        assert!(state
            .prepare_typing("he", start + Duration::from_millis(500), 0)
            .is_none());
        // Half the window later the peer gets a refresh
        assert!(state
            .prepare_typing("hel", start + Duration::from_millis(1500), 0)
            .is_some());
    }

    #[test]
    fn test_typing_requires_draft_and_open_socket() {
        let mut state = open_state();
        assert!(state.prepare_typing("   ", Instant::now(), 0).is_none());
        assert!(!state.is_local_typing());

        state.set_connection(ConnectionState::Reconnecting);
        assert!(state.prepare_typing("hi", Instant::now(), 0).is_none());
    }

    #[test]
    fn test_local_typing_expiry_clears_flag() {
        let mut state = open_state();
        let start = Instant::now();
        state.prepare_typing("h", start, 0);

        // Re-armed by a later keystroke
        state.prepare_typing("hi", start + Duration::from_secs(1), 0);
        state.on_deadline(start + Duration::from_secs(3));
        assert!(state.is_local_typing());

        // Expiry always clears, never toggles back on
        state.on_deadline(start + Duration::from_secs(4));
        assert!(!state.is_local_typing());
        state.on_deadline(start + Duration::from_secs(10));
        assert!(!state.is_local_typing());
    }

    #[test]
    fn test_losing_connection_drops_local_typing() {
        let mut state = open_state();
        state.prepare_typing("h", Instant::now(), 0);
        state.set_connection(ConnectionState::Reconnecting);
        assert!(!state.is_local_typing());
    }

    #[test]
    fn test_open_clears_last_error() {
        let mut state = open_state();
        state.set_connection(ConnectionState::Reconnecting);
        state.record_error("connection reset".to_string());
        assert_eq!(state.last_error(), Some("connection reset"));

        state.set_connection(ConnectionState::Open);
        assert_eq!(state.last_error(), None);
    }

    #[test]
    fn test_close_cancels_timers() {
        let mut state = open_state();
        let now = Instant::now();
        state.on_inbound_event(&frame("typing", "u2", "", 1), now, 0).unwrap();
        state.prepare_typing("h", now, 0);

        assert_eq!(
            state.close(),
            Some(SessionEvent::ConnectionChanged(ConnectionState::Closed))
        );
        assert_eq!(state.next_deadline(), None);
        assert_eq!(state.close(), None);
    }
}
