//! Wire Protocol Types
//!
//! Core types for the notification channel wire format. Every frame
//! exchanged over the transport is exactly one [`Envelope`], encoded as
//! UTF-8 JSON: `{ "topic": string, "content": object, "callback"?: string }`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ChannelError, Result};

/// Category tag on an envelope, determining how `content` is interpreted.
///
/// The topic set is open: unknown strings survive a decode/encode round
/// trip through the `Other` variant so new server-side topics never
/// require a client update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum Topic {
    /// Undefined topic, used by the server for error replies
    None,
    /// Connection established welcome message
    Connected,
    /// Connection status messages (server-side heartbeat)
    Connection,
    /// Ping/heartbeat messages
    Ping,
    /// Authentication handshake messages
    Authorization,
    /// System announcement carrying a [`Notification`]
    Announcement,
    /// General event messages
    Event,
    /// Any topic this client does not know about
    Other(String),
}

impl Topic {
    /// String form used on the wire
    pub fn as_str(&self) -> &str {
        match self {
            Topic::None => "NONE",
            Topic::Connected => "CONNECTED",
            Topic::Connection => "CONNECTION",
            Topic::Ping => "PING",
            Topic::Authorization => "AUTHORIZATION",
            Topic::Announcement => "ANNOUNCEMENT",
            Topic::Event => "EVENT",
            Topic::Other(s) => s,
        }
    }

    /// Whether this is one of the topics this client recognizes
    pub fn is_known(&self) -> bool {
        !matches!(self, Topic::Other(_))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        match s.as_str() {
            "NONE" => Topic::None,
            "CONNECTED" => Topic::Connected,
            "CONNECTION" => Topic::Connection,
            "PING" => Topic::Ping,
            "AUTHORIZATION" => Topic::Authorization,
            "ANNOUNCEMENT" => Topic::Announcement,
            "EVENT" => Topic::Event,
            _ => Topic::Other(s),
        }
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> String {
        topic.as_str().to_string()
    }
}

/// The unit exchanged over the wire: one topic-tagged payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Category determining the shape of `content`
    pub topic: Topic,
    /// Variant payload; shape is determined by `topic`
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub content: serde_json::Value,
    /// Optional correlation token echoed back by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,
}

impl Envelope {
    /// Create an envelope with the given topic and content
    pub fn new(topic: Topic, content: serde_json::Value) -> Self {
        Self {
            topic,
            content,
            callback: None,
        }
    }

    /// Create the outbound AUTHORIZATION envelope carrying the channel
    /// identity. Sent once by the session bootstrap after connect.
    pub fn authorization(user_id: &str) -> Self {
        let auth = Authorization {
            user_id: user_id.to_string(),
            session_token: None,
            kind: None,
        };
        Self::new(
            Topic::Authorization,
            serde_json::to_value(auth).unwrap_or_default(),
        )
    }

    /// Encode this envelope to its wire form (JSON text)
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode a wire frame into an envelope.
    ///
    /// Any parse failure yields [`ChannelError::Decode`]; the caller is
    /// expected to log and drop the frame, never to close the connection.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(ChannelError::from)
    }

    /// Interpret `content` as a [`Notification`] if this is an
    /// ANNOUNCEMENT envelope
    pub fn notification(&self) -> Option<Notification> {
        if self.topic != Topic::Announcement {
            return None;
        }
        serde_json::from_value(self.content.clone()).ok()
    }
}

/// Application-level event surfaced when an ANNOUNCEMENT envelope is
/// decoded. Held transiently by the consumer; never persisted by the
/// channel itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    /// Sub-classification within announcements (e.g. "promo")
    #[serde(default)]
    pub topic: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Authorization payload sent as the first outbound message after connect
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Authorization {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}
