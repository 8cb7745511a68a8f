//! Socket abstraction used by the session actor.
//!
//! The production implementation is [`WebSocketConnector`]; tests script
//! connections through an in-memory double.

use async_trait::async_trait;

use crate::error::TransportError;

#[cfg(test)]
pub(crate) mod mock;
mod websocket;

pub use websocket::{WebSocketConnector, WebSocketTransport};

/// One inbound data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// Opens connections to the chat service.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Perform the handshake against `url`.
    async fn connect(
        &self,
        url: &str,
        auth_token: Option<&str>,
    ) -> Result<Box<dyn Transport>, TransportError>;
}

/// An established bidirectional connection.
#[async_trait]
pub trait Transport: Send {
    /// Write one text frame.
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Wait for the next data frame. Returns `None` once the remote closed.
    ///
    /// Must be cancel-safe: the actor polls it inside `tokio::select!`.
    async fn recv(&mut self) -> Option<Result<InboundFrame, TransportError>>;

    /// Close the connection. Errors are ignored.
    async fn close(&mut self);
}
