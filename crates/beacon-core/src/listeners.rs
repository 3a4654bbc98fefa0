//! Listener Registry
//!
//! Per-category callback fan-out for channel occurrences. Four
//! independent insertion-ordered collections (connect, disconnect,
//! error, message); dispatch is synchronous in registration order, and a
//! panicking callback never prevents the remaining callbacks in the same
//! dispatch from running.
//!
//! Callbacks are reference-counted so a dispatcher can snapshot a
//! category and invoke it without holding any lock on the registry; a
//! callback is then free to unsubscribe itself or register new listeners
//! mid-dispatch.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use crate::error::ChannelError;
use crate::protocol::Envelope;

/// Occurrence category a listener is registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    Error,
    Message,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Connect => write!(f, "connect"),
            EventKind::Disconnect => write!(f, "disconnect"),
            EventKind::Error => write!(f, "error"),
            EventKind::Message => write!(f, "message"),
        }
    }
}

/// Handle identifying one registered callback.
///
/// Unregistration goes by this identity; unregistering twice is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId {
    kind: EventKind,
    seq: u64,
}

impl ListenerId {
    /// Category this listener was registered under
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// Callback for connect/disconnect occurrences
pub type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;
/// Callback for error occurrences
pub type ErrorCallback = Arc<dyn Fn(&ChannelError) + Send + Sync>;
/// Callback for decoded inbound envelopes
pub type MessageCallback = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Ordered collections of callbacks, one per occurrence category
#[derive(Default)]
pub struct ListenerRegistry {
    next_seq: u64,
    connect: Vec<(u64, LifecycleCallback)>,
    disconnect: Vec<(u64, LifecycleCallback)>,
    error: Vec<(u64, ErrorCallback)>,
    message: Vec<(u64, MessageCallback)>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("connect", &self.connect.len())
            .field("disconnect", &self.disconnect.len())
            .field("error", &self.error.len())
            .field("message", &self.message.len())
            .finish_non_exhaustive()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self, kind: EventKind) -> ListenerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        ListenerId { kind, seq }
    }

    /// Register a connect listener; returns its unregistration handle
    pub fn on_connect(&mut self, callback: LifecycleCallback) -> ListenerId {
        let id = self.next_id(EventKind::Connect);
        self.connect.push((id.seq, callback));
        id
    }

    /// Register a disconnect listener
    pub fn on_disconnect(&mut self, callback: LifecycleCallback) -> ListenerId {
        let id = self.next_id(EventKind::Disconnect);
        self.disconnect.push((id.seq, callback));
        id
    }

    /// Register an error listener
    pub fn on_error(&mut self, callback: ErrorCallback) -> ListenerId {
        let id = self.next_id(EventKind::Error);
        self.error.push((id.seq, callback));
        id
    }

    /// Register a message listener
    pub fn on_message(&mut self, callback: MessageCallback) -> ListenerId {
        let id = self.next_id(EventKind::Message);
        self.message.push((id.seq, callback));
        id
    }

    /// Remove a listener by identity. Safe no-op if already removed.
    pub fn unsubscribe(&mut self, id: ListenerId) {
        match id.kind {
            EventKind::Connect => self.connect.retain(|(seq, _)| *seq != id.seq),
            EventKind::Disconnect => self.disconnect.retain(|(seq, _)| *seq != id.seq),
            EventKind::Error => self.error.retain(|(seq, _)| *seq != id.seq),
            EventKind::Message => self.message.retain(|(seq, _)| *seq != id.seq),
        }
    }

    /// Number of listeners registered for a category
    pub fn len(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::Connect => self.connect.len(),
            EventKind::Disconnect => self.disconnect.len(),
            EventKind::Error => self.error.len(),
            EventKind::Message => self.message.len(),
        }
    }

    /// Whether a category has no listeners
    pub fn is_empty(&self, kind: EventKind) -> bool {
        self.len(kind) == 0
    }

    /// Snapshot of the connect callbacks, in registration order
    pub fn connect_listeners(&self) -> Vec<LifecycleCallback> {
        self.connect.iter().map(|(_, cb)| Arc::clone(cb)).collect()
    }

    /// Snapshot of the disconnect callbacks, in registration order
    pub fn disconnect_listeners(&self) -> Vec<LifecycleCallback> {
        self.disconnect
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect()
    }

    /// Snapshot of the error callbacks, in registration order
    pub fn error_listeners(&self) -> Vec<ErrorCallback> {
        self.error.iter().map(|(_, cb)| Arc::clone(cb)).collect()
    }

    /// Snapshot of the message callbacks, in registration order
    pub fn message_listeners(&self) -> Vec<MessageCallback> {
        self.message.iter().map(|(_, cb)| Arc::clone(cb)).collect()
    }

    /// Fan out a connect occurrence
    pub fn dispatch_connect(&self) {
        fan_out_lifecycle(EventKind::Connect, &self.connect_listeners());
    }

    /// Fan out a disconnect occurrence
    pub fn dispatch_disconnect(&self) {
        fan_out_lifecycle(EventKind::Disconnect, &self.disconnect_listeners());
    }

    /// Fan out an error occurrence
    pub fn dispatch_error(&self, err: &ChannelError) {
        fan_out_error(&self.error_listeners(), err);
    }

    /// Fan out a decoded envelope to all message listeners
    pub fn dispatch_message(&self, envelope: &Envelope) {
        fan_out_message(&self.message_listeners(), envelope);
    }
}

/// Invoke a snapshot of lifecycle callbacks, isolating panics.
///
/// Callers snapshot the category first and release any registry lock
/// before invoking, so a callback may unsubscribe or register listeners
/// while its own dispatch is in flight.
pub fn fan_out_lifecycle(kind: EventKind, callbacks: &[LifecycleCallback]) {
    for callback in callbacks {
        if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
            error!("{kind} listener panicked; continuing dispatch");
        }
    }
}

/// Invoke a snapshot of error callbacks, isolating panics
pub fn fan_out_error(callbacks: &[ErrorCallback], err: &ChannelError) {
    for callback in callbacks {
        if catch_unwind(AssertUnwindSafe(|| callback(err))).is_err() {
            error!("error listener panicked; continuing dispatch");
        }
    }
}

/// Invoke a snapshot of message callbacks, isolating panics
pub fn fan_out_message(callbacks: &[MessageCallback], envelope: &Envelope) {
    for callback in callbacks {
        if catch_unwind(AssertUnwindSafe(|| callback(envelope))).is_err() {
            error!(
                topic = %envelope.topic,
                "message listener panicked; continuing dispatch"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Topic;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_dispatch_in_registration_order() {
        let mut registry = ListenerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..4 {
            let order = Arc::clone(&order);
            registry.on_connect(Arc::new(move || order.lock().unwrap().push(n)));
        }

        registry.dispatch_connect();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_unsubscribe_removes_only_target() {
        let mut registry = ListenerRegistry::new();
        let hits = Arc::new(Mutex::new(Vec::new()));

        let hits_a = Arc::clone(&hits);
        let id_a = registry.on_message(Arc::new(move |_| hits_a.lock().unwrap().push("a")));
        let hits_b = Arc::clone(&hits);
        registry.on_message(Arc::new(move |_| hits_b.lock().unwrap().push("b")));

        registry.unsubscribe(id_a);
        assert_eq!(registry.len(EventKind::Message), 1);

        registry.dispatch_message(&Envelope::new(Topic::Event, serde_json::json!({})));
        assert_eq!(*hits.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_double_unsubscribe_is_noop() {
        let mut registry = ListenerRegistry::new();
        let id = registry.on_disconnect(Arc::new(|| {}));

        registry.unsubscribe(id);
        registry.unsubscribe(id);
        assert!(registry.is_empty(EventKind::Disconnect));
    }

    #[test]
    fn test_panicking_listener_does_not_stop_dispatch() {
        let mut registry = ListenerRegistry::new();
        let reached = Arc::new(Mutex::new(false));

        registry.on_message(Arc::new(|_| panic!("listener bug")));
        let reached_clone = Arc::clone(&reached);
        registry.on_message(Arc::new(move |_| *reached_clone.lock().unwrap() = true));

        registry.dispatch_message(&Envelope::new(Topic::Event, serde_json::json!({})));
        assert!(*reached.lock().unwrap());
    }

    #[test]
    fn test_snapshot_dispatch_survives_registry_mutation() {
        let mut registry = ListenerRegistry::new();
        let hits = Arc::new(Mutex::new(0));

        let hits_clone = Arc::clone(&hits);
        let id = registry.on_connect(Arc::new(move || *hits_clone.lock().unwrap() += 1));

        // a dispatcher holds only the snapshot; the registry itself is
        // free to mutate while the callbacks run
        let snapshot = registry.connect_listeners();
        registry.unsubscribe(id);
        assert!(registry.is_empty(EventKind::Connect));

        fan_out_lifecycle(EventKind::Connect, &snapshot);
        assert_eq!(*hits.lock().unwrap(), 1);

        // the next snapshot reflects the removal
        fan_out_lifecycle(EventKind::Connect, &registry.connect_listeners());
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn test_categories_are_independent() {
        let mut registry = ListenerRegistry::new();
        registry.on_connect(Arc::new(|| {}));
        registry.on_error(Arc::new(|_| {}));

        assert_eq!(registry.len(EventKind::Connect), 1);
        assert_eq!(registry.len(EventKind::Error), 1);
        assert!(registry.is_empty(EventKind::Disconnect));
        assert!(registry.is_empty(EventKind::Message));
    }
}
