//! Public handle for one conversation's real-time channel.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

use daterr_core::{
    validate_content, ChatMessage, ConnectionState, ConversationId, SessionId, UserId,
};

use crate::actor::SessionActor;
use crate::config::SessionConfig;
use crate::error::{SendError, TransportError};
use crate::event::{Command, SessionEvent, SessionSnapshot};
use crate::notify::{Notifier, SilentNotifier};
use crate::state::ChatState;
use crate::transport::{Connector, WebSocketConnector};

/// Running actor for the currently open conversation.
struct ActiveSession {
    session_id: SessionId,
    conversation_id: ConversationId,
    local_user_id: UserId,
    cmd_tx: mpsc::UnboundedSender<Command>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

/// Chat session for one conversation view.
///
/// Owns at most one socket, one ordered history and one typing indicator.
/// All state lives in a background task; this handle only sends commands and
/// reads snapshots. Dropping the handle tears the task down.
///
/// # Example
///
/// ```rust,no_run
/// use daterr_chat::{ChatSession, SessionConfig};
///
/// async fn chat() -> Result<(), Box<dyn std::error::Error>> {
///     let config = SessionConfig::new("ws://localhost:4000/v1/chat/ws");
///     let (mut session, mut events) = ChatSession::new(config);
///
///     session.open("c1", "u1").await?;
///     tokio::spawn(async move {
///         while let Some(event) = events.recv().await {
///             println!("{:?}", event);
///         }
///     });
///
///     session.send("hello").await?;
///     session.close().await;
///     Ok(())
/// }
/// ```
pub struct ChatSession {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    notifier: Arc<dyn Notifier>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    active: Option<ActiveSession>,
}

impl ChatSession {
    /// Create a session that connects over WebSocket.
    ///
    /// Returns the session and a receiver for its events.
    pub fn new(config: SessionConfig) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        Self::with_connector(config, Arc::new(WebSocketConnector))
    }

    /// Create a session with a custom connector.
    pub fn with_connector(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let session = Self {
            config,
            connector,
            notifier: Arc::new(SilentNotifier),
            event_tx,
            active: None,
        };
        (session, event_rx)
    }

    /// Set the collaborator notified of incoming messages.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Open the channel for `conversation_id` as `local_user_id`.
    ///
    /// Idempotent for the same pair. Opening a different pair first closes
    /// the current one, timers included. Fails only if the endpoint is not a
    /// valid URL, in which case the current session is left untouched.
    pub async fn open(
        &mut self,
        conversation_id: impl Into<ConversationId>,
        local_user_id: impl Into<UserId>,
    ) -> Result<(), TransportError> {
        let conversation_id = conversation_id.into();
        let local_user_id = local_user_id.into();

        if let Some(active) = &self.active {
            if active.conversation_id == conversation_id
                && active.local_user_id == local_user_id
                && !active.task.is_finished()
            {
                return Ok(());
            }
        }
        let url = self.config.socket_url(&local_user_id, &conversation_id)?;
        self.close().await;

        let session_id = SessionId::generate();

        let mut state = ChatState::new(
            local_user_id.clone(),
            conversation_id.clone(),
            &self.config,
        );
        if let Some(event) = state.set_connection(ConnectionState::Connecting) {
            self.event_tx.send(event).ok();
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot());

        let actor = SessionActor {
            config: self.config.clone(),
            url,
            connector: Arc::clone(&self.connector),
            notifier: Arc::clone(&self.notifier),
            state,
            cmd_rx,
            event_tx: self.event_tx.clone(),
            snapshot_tx,
        };

        let span = info_span!(
            "chat_session",
            session_id = %session_id,
            conversation_id = %conversation_id,
            user_id = %local_user_id
        );
        info!(
            session_id = %session_id,
            conversation_id = %conversation_id,
            "Opening chat session"
        );
        let task = tokio::spawn(actor.run().instrument(span));

        self.active = Some(ActiveSession {
            session_id,
            conversation_id,
            local_user_id,
            cmd_tx,
            snapshot_rx,
            task,
        });
        Ok(())
    }

    /// Send a message.
    ///
    /// Fails fast on blank or oversized text and when the socket is not open.
    /// Failed sends are not retried. On success the frame has been handed to
    /// the transport; the message shows up in history once the server echoes it.
    pub async fn send(&self, text: &str) -> Result<(), SendError> {
        validate_content(text, self.config.max_content_chars)?;
        let active = self.active.as_ref().ok_or(SendError::NotConnected)?;

        let (reply, response) = oneshot::channel();
        active
            .cmd_tx
            .send(Command::Send {
                text: text.to_string(),
                reply,
            })
            .map_err(|_| SendError::NotConnected)?;

        response.await.unwrap_or(Err(SendError::NotConnected))
    }

    /// Report a keystroke in the composer. `draft` is the current input text.
    ///
    /// No-op when the draft is blank or the socket is not open.
    pub fn notify_typing(&self, draft: &str) {
        if draft.trim().is_empty() {
            return;
        }
        if let Some(active) = &self.active {
            active
                .cmd_tx
                .send(Command::Typing {
                    draft: draft.to_string(),
                })
                .ok();
        }
    }

    /// Merge a backlog fetched over REST into history.
    pub fn seed_history(&self, messages: Vec<ChatMessage>) {
        if let Some(active) = &self.active {
            active.cmd_tx.send(Command::Seed { messages }).ok();
        }
    }

    /// Tear down the socket, cancel all timers and move to `Closed`.
    ///
    /// Safe to call any number of times. When it returns, the session task has
    /// exited and no further events will be produced for this conversation.
    pub async fn close(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.cmd_tx.send(Command::Close).ok();
        if let Err(e) = active.task.await {
            if e.is_panic() {
                warn!(session_id = %active.session_id, "Chat session task panicked");
            }
        }
        info!(session_id = %active.session_id, "Chat session disposed");
    }

    /// Latest state of the open conversation.
    pub fn snapshot(&self) -> SessionSnapshot {
        match &self.active {
            Some(active) => active.snapshot_rx.borrow().clone(),
            None => SessionSnapshot::default(),
        }
    }

    /// Receiver that is notified whenever the snapshot changes.
    pub fn subscribe(&self) -> Option<watch::Receiver<SessionSnapshot>> {
        self.active.as_ref().map(|active| active.snapshot_rx.clone())
    }

    /// Current connection state; `Closed` when nothing is open.
    pub fn connection_state(&self) -> ConnectionState {
        match &self.active {
            Some(active) => active.snapshot_rx.borrow().connection,
            None => ConnectionState::Closed,
        }
    }

    /// Conversation currently open, if any.
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.active.as_ref().map(|active| &active.conversation_id)
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}
