//! Client-side connection policy
//!
//! Pure state machine a relay client drives with socket lifecycle events.
//! It decides when to retry and when to give up; the caller owns the socket
//! and the timers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Surfaced to the user once the retry budget is spent
pub const GIVE_UP_MESSAGE: &str = "Failed to connect to chat server. Please refresh the page.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Fixed-delay retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Caller opened (or reopened) the socket
    Connect,
    Connected,
    ConnectError(String),
    Disconnected { server_initiated: bool },
    /// User logged out; stop everything
    Logout,
}

/// What the caller should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    RetryAfter(Duration),
    ReconnectNow,
    GiveUp(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub status: ConnectionStatus,
    pub directive: Option<Directive>,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    policy: ReconnectPolicy,
    status: ConnectionStatus,
    attempts: u32,
    last_error: Option<String>,
}

impl ConnectionTracker {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Failed attempts since the last successful connection
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn apply(&mut self, event: ConnectionEvent) -> Transition {
        let directive = match event {
            ConnectionEvent::Connect => {
                self.status = ConnectionStatus::Connecting;
                None
            }
            ConnectionEvent::Connected => {
                self.status = ConnectionStatus::Connected;
                self.attempts = 0;
                self.last_error = None;
                None
            }
            ConnectionEvent::ConnectError(reason) => {
                self.status = ConnectionStatus::Error;
                self.attempts = self.attempts.saturating_add(1);
                if self.attempts < self.policy.max_attempts {
                    self.last_error = Some(reason);
                    Some(Directive::RetryAfter(self.policy.delay))
                } else {
                    self.last_error = Some(GIVE_UP_MESSAGE.to_string());
                    Some(Directive::GiveUp(GIVE_UP_MESSAGE.to_string()))
                }
            }
            ConnectionEvent::Disconnected { server_initiated } => {
                self.status = ConnectionStatus::Disconnected;
                server_initiated.then_some(Directive::ReconnectNow)
            }
            ConnectionEvent::Logout => {
                self.status = ConnectionStatus::Disconnected;
                self.attempts = 0;
                self.last_error = None;
                None
            }
        };

        Transition {
            status: self.status,
            directive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn failure() -> ConnectionEvent {
        ConnectionEvent::ConnectError("refused".to_string())
    }

    #[test]
    fn test_retries_with_fixed_delay_then_gives_up() {
        let mut tracker = ConnectionTracker::new(ReconnectPolicy::default());
        tracker.apply(ConnectionEvent::Connect);

        for attempt in 1..5 {
            let t = tracker.apply(failure());
            assert_eq!(t.status, ConnectionStatus::Error);
            assert_eq!(
                t.directive,
                Some(Directive::RetryAfter(Duration::from_millis(1000))),
                "attempt {attempt}"
            );
        }

        let t = tracker.apply(failure());
        assert_eq!(t.directive, Some(Directive::GiveUp(GIVE_UP_MESSAGE.to_string())));
        assert_eq!(tracker.last_error(), Some(GIVE_UP_MESSAGE));
    }

    #[test]
    fn test_success_resets_attempts() {
        let mut tracker = ConnectionTracker::new(ReconnectPolicy::default());
        tracker.apply(failure());
        tracker.apply(failure());
        assert_eq!(tracker.attempts(), 2);

        let t = tracker.apply(ConnectionEvent::Connected);
        assert_eq!(t.status, ConnectionStatus::Connected);
        assert_eq!(tracker.attempts(), 0);
        assert_eq!(tracker.last_error(), None);
    }

    #[test]
    fn test_server_disconnect_reconnects_immediately() {
        let mut tracker = ConnectionTracker::default();
        tracker.apply(ConnectionEvent::Connected);

        let t = tracker.apply(ConnectionEvent::Disconnected {
            server_initiated: true,
        });
        assert_eq!(t.status, ConnectionStatus::Disconnected);
        assert_eq!(t.directive, Some(Directive::ReconnectNow));

        let t = tracker.apply(ConnectionEvent::Disconnected {
            server_initiated: false,
        });
        assert_eq!(t.directive, None);
    }

    #[test]
    fn test_logout_clears_state() {
        let mut tracker = ConnectionTracker::default();
        tracker.apply(failure());
        let t = tracker.apply(ConnectionEvent::Logout);
        assert_eq!(t.status, ConnectionStatus::Disconnected);
        assert_eq!(tracker.attempts(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_never_retries_past_budget(max in 1u32..10, failures in 1usize..30) {
            let mut tracker = ConnectionTracker::new(ReconnectPolicy {
                max_attempts: max,
                delay: Duration::from_millis(10),
            });
            let retries = (0..failures)
                .filter_map(|_| tracker.apply(failure()).directive)
                .filter(|d| matches!(d, Directive::RetryAfter(_)))
                .count();
            prop_assert!(retries < max as usize);
        }
    }
}
