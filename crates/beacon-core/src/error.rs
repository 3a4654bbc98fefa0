//! Channel error types
//!
//! Centralized error type for the event channel using `thiserror`.
//! Every failure here is recoverable at the transport layer: errors are
//! surfaced to consumers through the error occurrence (or returned from
//! `send`), never as panics. The worst outcome is a channel that settles
//! Disconnected until it is re-initialized.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the event channel
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ChannelError {
    /// Socket-level failure (connect, read, or write). Non-fatal:
    /// the reconnection policy still applies.
    #[error("transport error: {0}")]
    Transport(String),

    /// A single inbound frame failed to decode. The frame is dropped
    /// and the connection stays open.
    #[error("failed to decode frame: {0}")]
    Decode(String),

    /// `send` was invoked while the channel was not connected. The
    /// message never reached the socket; the caller must re-send after
    /// reconnect if it is still relevant.
    #[error("cannot send message: channel is not connected")]
    SendRejected,

    /// The reconnect counter hit its cap. The channel stays
    /// Disconnected until explicitly re-initialized.
    #[error("reconnect attempts exhausted after {0} tries")]
    ReconnectExhausted(u32),

    /// The configured endpoint is not a valid WebSocket URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Convert ChannelError to String for callers that want plain messages
impl From<ChannelError> for String {
    fn from(err: ChannelError) -> String {
        err.to_string()
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChannelError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ChannelError::SendRejected.to_string(),
            "cannot send message: channel is not connected"
        );
        assert_eq!(
            ChannelError::ReconnectExhausted(5).to_string(),
            "reconnect attempts exhausted after 5 tries"
        );
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let channel_err: ChannelError = err.into();
        assert!(matches!(channel_err, ChannelError::Decode(_)));
    }

    #[test]
    fn test_serializes_with_tag() {
        let json = serde_json::to_string(&ChannelError::Transport("refused".into())).unwrap();
        assert!(json.contains("\"type\":\"Transport\""));
        assert!(json.contains("refused"));
    }
}
