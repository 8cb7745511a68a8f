//! Connection status of a chat session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a conversation's socket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,
    /// Socket is open; sends are accepted.
    Open,
    /// Connection lost; waiting for the reconnect delay.
    Reconnecting,
    /// Session was disposed. Terminal.
    #[default]
    Closed,
}

impl ConnectionState {
    /// Returns true if outbound frames can be written.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}
