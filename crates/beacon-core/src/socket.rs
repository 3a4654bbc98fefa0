//! Transport Socket
//!
//! Thin wrapper around `tokio-tungstenite` exposing exactly what the
//! channel client needs: open, send text, reply to pings, close, and a
//! typed stream of raw socket occurrences. Everything else in the crate
//! goes through this module rather than `tokio-tungstenite` directly, so
//! TLS and handshake concerns live in one place.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;
use tracing::trace;

use crate::error::{ChannelError, Result};

/// Concrete WebSocket stream type
type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Raw occurrence reported by the socket
#[derive(Debug)]
pub enum SocketMessage {
    /// UTF-8 text frame
    Text(String),
    /// Binary frame
    Binary(Vec<u8>),
    /// Ping frame with payload
    Ping(Vec<u8>),
    /// Pong frame with payload
    Pong(Vec<u8>),
    /// Close frame with status code and reason
    Close {
        /// WebSocket close code (1000 = normal, 1005 = no code)
        code: u16,
        reason: String,
    },
}

/// Write half of the socket
#[derive(Debug)]
pub struct SocketWriter {
    sink: SplitSink<WsStream, tungstenite::Message>,
}

impl SocketWriter {
    /// Send a UTF-8 text frame
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Text(text.to_string()))
            .await
            .map_err(ChannelError::from)
    }

    /// Send a pong frame in response to a ping
    pub async fn send_pong(&mut self, data: Vec<u8>) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Pong(data))
            .await
            .map_err(ChannelError::from)
    }

    /// Flush pending writes and close the sink
    pub async fn close(&mut self) -> Result<()> {
        self.sink.close().await.map_err(ChannelError::from)
    }
}

/// Read half of the socket
#[derive(Debug)]
pub struct SocketReader {
    stream: SplitStream<WsStream>,
}

impl SocketReader {
    /// Receive the next occurrence, returning `None` when the stream ends.
    ///
    /// Raw `Frame` variants are skipped internally.
    pub async fn recv(&mut self) -> Option<Result<SocketMessage>> {
        loop {
            match self.stream.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    return Some(Ok(SocketMessage::Text(text.to_string())));
                }
                Some(Ok(tungstenite::Message::Binary(data))) => {
                    return Some(Ok(SocketMessage::Binary(data.to_vec())));
                }
                Some(Ok(tungstenite::Message::Ping(data))) => {
                    return Some(Ok(SocketMessage::Ping(data.to_vec())));
                }
                Some(Ok(tungstenite::Message::Pong(data))) => {
                    return Some(Ok(SocketMessage::Pong(data.to_vec())));
                }
                Some(Ok(tungstenite::Message::Close(close_frame))) => {
                    let (code, reason) = close_frame
                        .map(|cf| (cf.code.into(), cf.reason.to_string()))
                        .unwrap_or((1005, String::new()));
                    return Some(Ok(SocketMessage::Close { code, reason }));
                }
                Some(Ok(tungstenite::Message::Frame(_))) => {
                    trace!("skipping raw frame");
                    continue;
                }
                Some(Err(e)) => return Some(Err(ChannelError::from(e))),
                None => return None,
            }
        }
    }
}

/// Open a WebSocket connection to `endpoint`.
///
/// Performs URL parsing, TLS negotiation, and the WebSocket handshake,
/// then splits the stream into independent writer/reader halves for use
/// in `tokio::select!` loops.
pub async fn connect(endpoint: &str) -> Result<(SocketWriter, SocketReader)> {
    use tungstenite::client::IntoClientRequest;

    let request = endpoint
        .into_client_request()
        .map_err(|e| ChannelError::InvalidEndpoint(format!("{endpoint}: {e}")))?;

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(ChannelError::from)?;

    let (sink, stream) = ws_stream.split();

    Ok((SocketWriter { sink }, SocketReader { stream }))
}
