//! Error types for the chat session.

use thiserror::Error;

use daterr_core::CoreError;

/// Local precondition failures of [`ChatSession::send`](crate::ChatSession::send).
///
/// These are never retried and never trigger a reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Text is blank after trimming.
    #[error("message is empty")]
    Empty,

    /// Text exceeds the configured character limit.
    #[error("message too long: {len} characters (max {max})")]
    TooLong { len: usize, max: usize },

    /// The socket is not open.
    #[error("not connected")]
    NotConnected,
}

impl From<CoreError> for SendError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ContentTooLong { len, max } => Self::TooLong { len, max },
            CoreError::EmptyContent => Self::Empty,
        }
    }
}

/// Transient socket failures. All of them lead to a reconnect.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Handshake could not be completed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Handshake did not finish in time.
    #[error("connection timed out")]
    Timeout,

    /// Error on an established socket.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Remote side closed the socket.
    #[error("connection closed by server")]
    Closed,

    /// Endpoint could not be turned into a socket URL.
    #[error("invalid endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
