//! Session task with automatic reconnection.
//!
//! One actor per open conversation. Inbound frames, commands from the handle
//! and timer expiries are all serialized through `tokio::select!` loops, so
//! `ChatState` is only ever touched from this task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use daterr_core::{ChatMessage, ConnectionState, Envelope};

use crate::config::SessionConfig;
use crate::error::{SendError, TransportError};
use crate::event::{reconnect_event, Command, SessionEvent, SessionSnapshot};
use crate::notify::Notifier;
use crate::state::ChatState;
use crate::transport::{Connector, InboundFrame, Transport};

/// Why a connected phase ended.
enum Exit {
    /// Close requested by the owner.
    Close,
    /// Socket failed or the server went away.
    Lost(TransportError),
}

pub(crate) struct SessionActor {
    pub(crate) config: SessionConfig,
    pub(crate) url: String,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) state: ChatState,
    pub(crate) cmd_rx: mpsc::UnboundedReceiver<Command>,
    pub(crate) event_tx: mpsc::UnboundedSender<SessionEvent>,
    pub(crate) snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionActor {
    /// Run until closed. Retries forever on transport failure.
    pub(crate) async fn run(mut self) {
        let mut attempt: u32 = 0;

        // Outer connection loop - keeps trying to connect
        loop {
            self.transition(ConnectionState::Connecting);
            info!(url = %self.url, "Connecting to chat service");

            match self.connect().await {
                Ok(Some(mut transport)) => {
                    attempt = 0;
                    self.transition(ConnectionState::Open);
                    info!("Chat connection established");

                    match self.pump(transport.as_mut()).await {
                        Exit::Close => {
                            let closing = transport.close();
                            if tokio::time::timeout(self.config.close_timeout, closing)
                                .await
                                .is_err()
                            {
                                warn!("Timed out closing chat connection");
                            }
                            break;
                        }
                        Exit::Lost(err) => {
                            warn!(error = %err, "Chat connection lost");
                            self.report(err);
                        }
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "Chat connection failed");
                    self.report(err);
                }
            }

            attempt = attempt.saturating_add(1);
            let delay = self.config.reconnect.delay(attempt);
            self.transition(ConnectionState::Reconnecting);
            self.emit(reconnect_event(attempt, delay));
            info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting in {:?}", delay
            );

            if self.wait_with_commands(delay).await {
                break;
            }
        }

        if let Some(event) = self.state.close() {
            self.emit(event);
        }
        self.publish();
        info!("Chat session closed");
    }

    /// Handshake, while still serving commands and timers.
    ///
    /// Returns `Ok(None)` if close was requested meanwhile.
    async fn connect(&mut self) -> Result<Option<Box<dyn Transport>>, TransportError> {
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let token = self.config.auth_token.clone();
        let handshake = tokio::time::timeout(
            self.config.connect_timeout,
            connector.connect(&url, token.as_deref()),
        );
        tokio::pin!(handshake);

        loop {
            tokio::select! {
                result = &mut handshake => {
                    return match result {
                        Ok(Ok(transport)) => Ok(Some(transport)),
                        Ok(Err(err)) => Err(err),
                        Err(_) => Err(TransportError::Timeout),
                    };
                }
                cmd = self.cmd_rx.recv() => {
                    if self.handle_offline(cmd) {
                        return Ok(None);
                    }
                }
                _ = sleep_until_deadline(self.state.next_deadline()) => {
                    self.expire_timers();
                }
            }
        }
    }

    /// Connected phase: process frames, commands and timers in arrival order.
    async fn pump(&mut self, transport: &mut dyn Transport) -> Exit {
        loop {
            tokio::select! {
                frame = transport.recv() => match frame {
                    Some(Ok(frame)) => self.on_inbound_event(frame),
                    Some(Err(err)) => return Exit::Lost(err),
                    None => return Exit::Lost(TransportError::Closed),
                },
                cmd = self.cmd_rx.recv() => match cmd {
                    None | Some(Command::Close) => return Exit::Close,
                    Some(Command::Send { text, reply }) => {
                        let frames = match self.state.prepare_send(&text, now_secs()) {
                            Ok(frames) => frames,
                            Err(err) => {
                                reply.send(Err(err)).ok();
                                continue;
                            }
                        };
                        if let Err(err) = write_frames(transport, frames).await {
                            reply.send(Err(SendError::NotConnected)).ok();
                            return Exit::Lost(err);
                        }
                        self.publish();
                        reply.send(Ok(())).ok();
                    }
                    Some(Command::Typing { draft }) => {
                        if let Some(frame) = self.state.prepare_typing(&draft, Instant::now(), now_secs()) {
                            if let Err(err) = write_frames(transport, vec![frame]).await {
                                return Exit::Lost(err);
                            }
                        }
                        self.publish();
                    }
                    Some(Command::Seed { messages }) => self.seed(messages),
                },
                _ = sleep_until_deadline(self.state.next_deadline()) => {
                    self.expire_timers();
                }
            }
        }
    }

    /// Wait for the reconnect delay, but respond to commands and timers.
    ///
    /// Returns `true` if close was requested.
    async fn wait_with_commands(&mut self, duration: Duration) -> bool {
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => {
                    return false;
                }
                cmd = self.cmd_rx.recv() => {
                    if self.handle_offline(cmd) {
                        return true;
                    }
                }
                _ = sleep_until_deadline(self.state.next_deadline()) => {
                    self.expire_timers();
                }
            }
        }
    }

    /// Serve a command while no socket is open. Returns `true` on close.
    fn handle_offline(&mut self, cmd: Option<Command>) -> bool {
        match cmd {
            None | Some(Command::Close) => true,
            Some(Command::Send { text, reply }) => {
                // Not open, so this only ever yields a precondition error
                let result = self.state.prepare_send(&text, now_secs()).map(|_| ());
                reply.send(result).ok();
                false
            }
            Some(Command::Typing { .. }) => {
                debug!("Ignoring typing notification while disconnected");
                false
            }
            Some(Command::Seed { messages }) => {
                self.seed(messages);
                false
            }
        }
    }

    fn on_inbound_event(&mut self, frame: InboundFrame) {
        let parsed = match frame {
            InboundFrame::Text(text) => Envelope::parse(&text),
            InboundFrame::Binary(data) => Envelope::parse_bytes(&data),
        };
        let envelope = match parsed {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "Dropping malformed frame");
                return;
            }
        };

        if let Some(event) = self
            .state
            .apply_envelope(envelope, Instant::now(), now_secs())
        {
            if let SessionEvent::MessageReceived(message) = &event {
                if !message.is_from(self.state.local_user()) {
                    self.notifier.message_received(message);
                }
            }
            self.emit(event);
        }
        self.publish();
    }

    fn seed(&mut self, messages: Vec<ChatMessage>) {
        let event = self.state.seed(messages);
        debug!(?event, "Merged history backlog");
        self.emit(event);
        self.publish();
    }

    fn expire_timers(&mut self) {
        if let Some(event) = self.state.on_deadline(Instant::now()) {
            self.emit(event);
        }
        self.publish();
    }

    fn transition(&mut self, next: ConnectionState) {
        if let Some(event) = self.state.set_connection(next) {
            self.emit(event);
        }
        self.publish();
    }

    fn report(&mut self, err: TransportError) {
        let event = self.state.record_error(err.to_string());
        self.emit(event);
        self.publish();
    }

    fn emit(&self, event: SessionEvent) {
        // The UI may have stopped listening; the session keeps running regardless
        self.event_tx.send(event).ok();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.state.snapshot());
    }
}

async fn write_frames(
    transport: &mut dyn Transport,
    frames: Vec<Envelope>,
) -> Result<(), TransportError> {
    for frame in frames {
        debug!(kind = frame.kind_name(), "Sending frame");
        transport.send(frame.to_json()).await?;
    }
    Ok(())
}

/// Sleep until `deadline`, or forever if there is none.
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
