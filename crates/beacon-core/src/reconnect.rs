//! Reconnection Policy
//!
//! Connection state machine and retry schedule for the event channel.
//! The delay computation is a pure function of the attempt number so the
//! backoff can be tested without a socket or a clock.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Connection state of the channel.
///
/// Exactly one transport socket is open system-wide while the state is
/// Connecting or Connected; re-initializing in those states is a no-op.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No socket exists; a retry may be scheduled
    #[default]
    Disconnected,
    /// A socket is being opened
    Connecting,
    /// The socket is open and frames flow
    Connected,
    /// Teardown in progress
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Closing => write!(f, "closing"),
        }
    }
}

/// Retry schedule for unexpected closures.
///
/// Linear backoff: the Nth consecutive retry waits `N * base_delay`,
/// up to a hard cap on consecutive attempts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay multiplier between attempts
    pub base_delay: Duration,
    /// Retries allowed before the channel settles Disconnected
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the Nth consecutive retry (1-based).
    ///
    /// Returns `None` once `attempt` exceeds the cap (or for attempt 0,
    /// which is the initial connect and is never delayed).
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        Some(self.base_delay * attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }

    #[test]
    fn test_default_state_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_linear_backoff_sequence() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<_> = (1..=5).map(|n| policy.delay_for(n)).collect();
        assert_eq!(
            delays,
            vec![
                Some(Duration::from_millis(1000)),
                Some(Duration::from_millis(2000)),
                Some(Duration::from_millis(3000)),
                Some(Duration::from_millis(4000)),
                Some(Duration::from_millis(5000)),
            ]
        );
    }

    #[test]
    fn test_no_retry_past_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(6), None);
        assert_eq!(policy.delay_for(100), None);
    }

    #[test]
    fn test_attempt_zero_is_not_a_retry() {
        assert_eq!(ReconnectPolicy::default().delay_for(0), None);
    }

    #[test]
    fn test_custom_policy() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(250),
            max_attempts: 2,
        };
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(3), None);
    }
}
