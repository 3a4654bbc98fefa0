//! Beacon Core Library
//!
//! A resilient event channel over WebSocket: a long-lived client that
//! connects to a notification endpoint, authorizes the session, fans
//! decoded frames out to registered listeners, and transparently
//! reconnects with linear backoff when the connection drops.
//!
//! # Modules
//!
//! - [`client`] - Channel client, connection loop, process-wide singleton
//! - [`protocol`] - Wire envelope, topics, and payload types
//! - [`listeners`] - Listener registry and occurrence fan-out
//! - [`reconnect`] - Connection states and the linear backoff policy
//! - [`socket`] - Thin transport wrapper over `tokio-tungstenite`
//! - [`error`] - Error types

pub mod client;
pub mod error;
pub mod listeners;
pub mod protocol;
pub mod reconnect;
pub mod socket;

// Re-export commonly used types
pub use client::{get, initialize, teardown, ChannelClient, ChannelConfig, DEFAULT_ENDPOINT};
pub use error::{ChannelError, Result};
pub use listeners::{EventKind, ListenerId};
pub use protocol::{Authorization, Envelope, Notification, Topic};
pub use reconnect::{ConnectionState, ReconnectPolicy};
