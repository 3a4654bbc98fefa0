//! Channel Client
//!
//! The composed event channel: one background task owns the transport
//! socket and drives the reconnect loop, decoding inbound frames and
//! fanning occurrences out through the listener registry. Callers hold a
//! [`ChannelClient`] handle and interact only through `send`, listener
//! registration, state reads, and `teardown`.
//!
//! # Architecture
//!
//! ```text
//!   ChannelClient (handle)            background connection task
//!         │                                    │
//!         │  send(envelope) ── outbound mpsc ─►│  owns SocketWriter/Reader
//!         │  on_connect/on_message/...         │  reconnect w/ linear backoff
//!         │  teardown() ── shutdown notify ───►│  decode → listener fan-out
//! ```
//!
//! A process-wide singleton ([`initialize`]/[`get`]/[`teardown`]) guards
//! against duplicate sockets when multiple consumers request the channel;
//! independent clients can still be constructed directly in tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use crate::error::{ChannelError, Result};
use crate::listeners::{self, EventKind, ListenerId, ListenerRegistry};
use crate::protocol::Envelope;
use crate::reconnect::{ConnectionState, ReconnectPolicy};
use crate::socket::{self, SocketMessage, SocketReader, SocketWriter};

/// Default wire endpoint of the notification channel
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8382/notifications";

/// Configuration for one channel client.
///
/// The endpoint is immutable for the lifetime of the client; changing it
/// requires teardown and re-initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// WebSocket endpoint (scheme + host + port + path)
    pub endpoint: String,
    /// Retry schedule for unexpected closures
    pub policy: ReconnectPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            policy: ReconnectPolicy::default(),
        }
    }
}

impl ChannelConfig {
    /// Config for `endpoint` with the default reconnect policy
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}

/// State shared between the client handle and its background task
#[derive(Debug)]
struct Shared {
    state: Mutex<ConnectionState>,
    listeners: Mutex<ListenerRegistry>,
    shutdown: AtomicBool,
    shutdown_notify: Notify,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Disconnected),
            listeners: Mutex::new(ListenerRegistry::new()),
            shutdown: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: ConnectionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn listeners(&self) -> std::sync::MutexGuard<'_, ListenerRegistry> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Dispatch helpers snapshot the category under the lock and invoke
    // the callbacks with the lock released, so a callback can call back
    // into the client (unsubscribe, register) without deadlocking.

    fn dispatch_connect(&self) {
        let snapshot = self.listeners().connect_listeners();
        listeners::fan_out_lifecycle(EventKind::Connect, &snapshot);
    }

    fn dispatch_disconnect(&self) {
        let snapshot = self.listeners().disconnect_listeners();
        listeners::fan_out_lifecycle(EventKind::Disconnect, &snapshot);
    }

    fn dispatch_error(&self, err: &ChannelError) {
        let snapshot = self.listeners().error_listeners();
        listeners::fan_out_error(&snapshot, err);
    }

    fn dispatch_message(&self, envelope: &Envelope) {
        let snapshot = self.listeners().message_listeners();
        listeners::fan_out_message(&snapshot, envelope);
    }
}

/// Resilient event channel client.
///
/// Owns a background task that manages the socket lifecycle (connect,
/// reconnect with linear backoff, teardown). Dropping the last handle
/// tears the channel down.
#[derive(Debug)]
pub struct ChannelClient {
    shared: Arc<Shared>,
    outbound_tx: mpsc::UnboundedSender<String>,
    endpoint: String,
}

impl ChannelClient {
    /// Create a client and spawn its background connection task.
    ///
    /// Must be called within a tokio runtime. Connecting is asynchronous
    /// relative to the caller: react to the connect occurrence rather
    /// than assuming an established connection on return.
    pub fn connect(config: ChannelConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new());
        let endpoint = config.endpoint.clone();

        tokio::spawn(run_connection_loop(config, Arc::clone(&shared), outbound_rx));

        Self {
            shared,
            outbound_tx,
            endpoint,
        }
    }

    /// Endpoint this client was created against
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Whether the channel is currently connected
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Encode and send an envelope.
    ///
    /// Fire-and-forget: there is no acknowledgement or retry. While not
    /// connected this returns [`ChannelError::SendRejected`] without
    /// touching the socket; re-send after reconnect if still relevant.
    pub fn send(&self, envelope: &Envelope) -> Result<()> {
        if !self.is_connected() {
            warn!(
                topic = %envelope.topic,
                state = %self.state(),
                "cannot send message: channel is not connected"
            );
            return Err(ChannelError::SendRejected);
        }
        self.outbound_tx
            .send(envelope.encode())
            .map_err(|_| ChannelError::SendRejected)
    }

    /// Register a connect listener
    pub fn on_connect(&self, callback: impl Fn() + Send + Sync + 'static) -> ListenerId {
        self.shared.listeners().on_connect(Arc::new(callback))
    }

    /// Register a disconnect listener
    pub fn on_disconnect(&self, callback: impl Fn() + Send + Sync + 'static) -> ListenerId {
        self.shared.listeners().on_disconnect(Arc::new(callback))
    }

    /// Register an error listener
    pub fn on_error(
        &self,
        callback: impl Fn(&ChannelError) + Send + Sync + 'static,
    ) -> ListenerId {
        self.shared.listeners().on_error(Arc::new(callback))
    }

    /// Register a message listener receiving every decoded inbound
    /// envelope. Routing by topic is the consumer's responsibility.
    pub fn on_message(
        &self,
        callback: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> ListenerId {
        self.shared.listeners().on_message(Arc::new(callback))
    }

    /// Remove a listener by identity; no-op if already removed
    pub fn unsubscribe(&self, id: ListenerId) {
        self.shared.listeners().unsubscribe(id);
    }

    /// Close the socket and cancel any pending scheduled retry.
    ///
    /// Idempotent. After teardown the channel settles Disconnected and
    /// never reconnects on its own.
    pub fn teardown(&self) {
        if self.shared.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.set_state(ConnectionState::Closing);
        self.shared.shutdown_notify.notify_one();
        info!(endpoint = %self.endpoint, "channel teardown requested");
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// How one connected session ended
enum SessionExit {
    /// Teardown was requested
    Shutdown,
    /// Connection was lost; reconnect policy applies
    Disconnected,
}

/// Main connection loop: connect, run the session, schedule retries.
///
/// The reconnect counter resets to 0 only on a successful connect. When
/// the policy yields no further delay the loop surfaces
/// `ReconnectExhausted` and waits for teardown; only a fresh client
/// restarts the cycle.
async fn run_connection_loop(
    config: ChannelConfig,
    shared: Arc<Shared>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
) {
    let mut attempts: u32 = 0;

    loop {
        if shared.is_shutdown() {
            break;
        }

        shared.set_state(ConnectionState::Connecting);
        debug!(endpoint = %config.endpoint, "opening transport socket");

        match socket::connect(&config.endpoint).await {
            Ok((mut writer, reader)) => {
                // teardown may have raced the in-flight handshake
                if shared.is_shutdown() {
                    let _ = writer.close().await;
                    break;
                }

                info!(endpoint = %config.endpoint, "channel connected");
                attempts = 0;

                // Drop sends that were queued against a previous connection
                while outbound_rx.try_recv().is_ok() {}

                shared.set_state(ConnectionState::Connected);
                shared.dispatch_connect();

                let exit = run_session(&shared, writer, reader, &mut outbound_rx).await;

                shared.set_state(ConnectionState::Disconnected);
                shared.dispatch_disconnect();

                if matches!(exit, SessionExit::Shutdown) {
                    break;
                }
                info!("channel disconnected");
            }
            Err(e) => {
                warn!(endpoint = %config.endpoint, error = %e, "connect failed");
                shared.dispatch_error(&e);
                shared.set_state(ConnectionState::Disconnected);
                shared.dispatch_disconnect();
            }
        }

        if shared.is_shutdown() {
            break;
        }

        attempts += 1;
        let Some(delay) = config.policy.delay_for(attempts) else {
            warn!(
                attempts = config.policy.max_attempts,
                "reconnect attempts exhausted; channel settles disconnected"
            );
            shared.dispatch_error(&ChannelError::ReconnectExhausted(config.policy.max_attempts));
            // park until teardown so the Closing handoff always has a
            // live task to settle the state
            shared.shutdown_notify.notified().await;
            break;
        };

        debug!(
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shared.shutdown_notify.notified() => {
                debug!("pending reconnect cancelled by teardown");
                break;
            }
        }
    }

    // every exit path lands here so teardown's Closing always settles
    shared.set_state(ConnectionState::Disconnected);
}

/// Message loop for one connected socket.
///
/// Frames are dispatched in arrival order; transport-level pings get
/// automatic pong replies; a malformed frame is logged and dropped
/// without ending the session.
async fn run_session(
    shared: &Shared,
    mut writer: SocketWriter,
    mut reader: SocketReader,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
) -> SessionExit {
    loop {
        tokio::select! {
            _ = shared.shutdown_notify.notified() => {
                let _ = writer.close().await;
                return SessionExit::Shutdown;
            }

            msg = reader.recv() => match msg {
                Some(Ok(SocketMessage::Text(text))) => handle_frame(shared, &text),
                Some(Ok(SocketMessage::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => handle_frame(shared, &text),
                    Err(_) => warn!("dropping non-UTF-8 binary frame"),
                },
                Some(Ok(SocketMessage::Ping(data))) => {
                    let _ = writer.send_pong(data).await;
                }
                Some(Ok(SocketMessage::Pong(_))) => {}
                Some(Ok(SocketMessage::Close { code, reason })) => {
                    info!(code, reason = %reason, "server closed connection");
                    return SessionExit::Disconnected;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "socket read error");
                    shared.dispatch_error(&e);
                    return SessionExit::Disconnected;
                }
                None => {
                    info!("socket stream ended");
                    return SessionExit::Disconnected;
                }
            },

            Some(text) = outbound_rx.recv() => {
                if let Err(e) = writer.send_text(&text).await {
                    warn!(error = %e, "socket write failed");
                    shared.dispatch_error(&e);
                    return SessionExit::Disconnected;
                }
            }
        }
    }
}

/// Decode one inbound frame and fan it out; malformed frames are dropped
fn handle_frame(shared: &Shared, text: &str) {
    match Envelope::decode(text) {
        Ok(envelope) => {
            debug!(topic = %envelope.topic, "inbound envelope");
            shared.dispatch_message(&envelope);
        }
        Err(e) => {
            warn!(error = %e, "dropping malformed frame");
        }
    }
}

/// The one process-wide channel client
static ACTIVE_CHANNEL: Lazy<Mutex<Option<Arc<ChannelClient>>>> = Lazy::new(|| Mutex::new(None));

/// Initialize the process-wide channel, or return the existing one.
///
/// Idempotent: while a channel exists, further calls return it unchanged
/// (the config argument is ignored) so concurrent consumers can never
/// open a second socket.
pub fn initialize(config: ChannelConfig) -> Arc<ChannelClient> {
    let mut slot = ACTIVE_CHANNEL
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(client) = slot.as_ref() {
        return Arc::clone(client);
    }
    let client = Arc::new(ChannelClient::connect(config));
    *slot = Some(Arc::clone(&client));
    client
}

/// The process-wide channel, if initialized
pub fn get() -> Option<Arc<ChannelClient>> {
    ACTIVE_CHANNEL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(Arc::clone)
}

/// Tear down the process-wide channel and clear the singleton slot.
/// Idempotent; a later [`initialize`] starts a fresh cycle.
pub fn teardown() {
    let client = ACTIVE_CHANNEL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(client) = client {
        client.teardown();
    }
}
