//! WebSocket implementation of the [`Connector`] / [`Transport`] seams.
//!
//! Built on `tokio-tungstenite`.  Pings from the server are answered by
//! tungstenite itself the next time the stream is read or flushed, so the
//! worker only has to keep reading.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use relay_core::Endpoint;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use super::{Connector, Frame, Transport, TransportError};

/// Dials `ws://host:port` for each attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>, TransportError> {
        let url = endpoint.ws_url();
        let (stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!(%url, status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WebSocketTransport { stream }))
    }
}

pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn send_ping(&mut self) -> Result<(), TransportError> {
        self.stream
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        let message = self.stream.next().await?;
        Some(match message {
            Ok(Message::Text(text)) => Ok(Frame::Text(text)),
            Ok(Message::Binary(bytes)) => Ok(Frame::Binary(bytes)),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {
                Ok(Frame::Control)
            }
            Ok(Message::Close(frame)) => Ok(Frame::Close(frame.map(|f| f.reason.into_owned()))),
            Err(e) => Err(TransportError::Receive(e.to_string())),
        })
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
