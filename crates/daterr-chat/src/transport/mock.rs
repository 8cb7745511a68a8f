//! In-memory connector for session tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Connector, InboundFrame, Transport};
use crate::error::TransportError;

/// Server side of one accepted mock connection.
pub(crate) struct MockRemote {
    pub url: String,
    pub auth_token: Option<String>,
    to_client: Option<mpsc::UnboundedSender<Result<InboundFrame, TransportError>>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MockRemote {
    /// Deliver a text frame to the session.
    pub fn push(&self, raw: &str) {
        if let Some(tx) = &self.to_client {
            tx.send(Ok(InboundFrame::Text(raw.to_string()))).ok();
        }
    }

    /// Deliver a binary frame to the session.
    pub fn push_binary(&self, data: Vec<u8>) {
        if let Some(tx) = &self.to_client {
            tx.send(Ok(InboundFrame::Binary(data))).ok();
        }
    }

    /// Fail the socket with a transport error.
    pub fn fail(&self) {
        if let Some(tx) = &self.to_client {
            tx.send(Err(TransportError::Connect("connection reset".to_string())))
                .ok();
        }
    }

    /// Close the socket from the server side.
    pub fn hang_up(&mut self) {
        self.to_client = None;
    }

    /// Frames written by the session so far.
    pub fn drain_outbound(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.from_client.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

/// Connector that accepts or refuses according to a script.
pub(crate) struct MockConnector {
    refusals: AtomicU32,
    attempts: AtomicU32,
    stall_close: AtomicBool,
    accepted: mpsc::UnboundedSender<MockRemote>,
}

impl MockConnector {
    /// Create a connector and the stream of accepted connections.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockRemote>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            refusals: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
            stall_close: AtomicBool::new(false),
            accepted,
        });
        (connector, rx)
    }

    /// Refuse the next `count` handshakes.
    pub fn refuse_next(&self, count: u32) {
        self.refusals.fetch_add(count, Ordering::SeqCst);
    }

    /// Make transports accepted from now on never finish closing.
    pub fn stall_close(&self) {
        self.stall_close.store(true, Ordering::SeqCst);
    }

    /// Handshakes attempted so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        url: &str,
        auth_token: Option<&str>,
    ) -> Result<Box<dyn Transport>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        self.accepted
            .send(MockRemote {
                url: url.to_string(),
                auth_token: auth_token.map(str::to_string),
                to_client: Some(to_client),
                from_client,
            })
            .ok();

        Ok(Box::new(MockTransport {
            inbound,
            outbound,
            stall_close: self.stall_close.load(Ordering::SeqCst),
        }))
    }
}

struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Result<InboundFrame, TransportError>>,
    outbound: mpsc::UnboundedSender<String>,
    stall_close: bool,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.outbound.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        self.inbound.close();
        if self.stall_close {
            std::future::pending::<()>().await;
        }
    }
}
