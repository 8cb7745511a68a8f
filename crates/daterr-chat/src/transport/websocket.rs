//! WebSocket transport backed by tokio-tungstenite.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use super::{Connector, InboundFrame, Transport};
use crate::error::TransportError;

/// Opens `ws://` and `wss://` connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(
        &self,
        url: &str,
        auth_token: Option<&str>,
    ) -> Result<Box<dyn Transport>, TransportError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        if let Some(token) = auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| TransportError::Connect(format!("invalid auth token: {}", e)))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WebSocketTransport { stream }))
    }
}

/// An open WebSocket.
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        trace!(len = frame.len(), "Writing frame");
        self.stream.send(Message::Text(frame)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };

            match message {
                Message::Text(text) => return Some(Ok(InboundFrame::Text(text))),
                Message::Binary(data) => return Some(Ok(InboundFrame::Binary(data))),
                Message::Close(frame) => {
                    debug!(?frame, "Close frame received");
                    return None;
                }
                // tungstenite answers pings itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "Error while closing WebSocket");
        }
    }
}
