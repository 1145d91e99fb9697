//! Connection lifecycle state machine for the hub push channel.
//!
//! [`ReconnectController`] owns the [`ConnectionState`] and the
//! consecutive-failure counter. It does no I/O: the push channel's
//! connection task reports what happened (`on_connected`,
//! `on_connection_lost`) and the controller answers with the delay before
//! the next retry, or with `None` once the attempt budget is spent.
//!
//! ```text
//! Disconnected --connect()--> Connecting --on_connected()--> Connected
//!      ^                          |                              |
//!      |                   on_connection_lost()          on_connection_lost()
//!      |                          v                              v
//!      +--- budget spent --- Reconnecting <----------------------+
//!      +--- disconnect() from any state
//! ```
//!
//! Every transition is logged and published on a `watch` channel.

use std::time::Duration;

use tokio::sync::watch;

use crate::error::ClientError;

/// Lifecycle of the push connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn name(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// ReconnectPolicy
// ---------------------------------------------------------------------------

/// Retry schedule and attempt budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the n-th retry; the last entry repeats.
    pub delays: Vec<Duration>,
    /// Consecutive failures tolerated before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delays: [0, 2_000, 5_000, 10_000, 30_000]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(delays: Vec<Duration>, max_attempts: u32) -> Result<Self, ClientError> {
        if delays.is_empty() {
            return Err(ClientError::Config(
                "reconnect delay schedule must not be empty".into(),
            ));
        }
        if max_attempts == 0 {
            return Err(ClientError::Config(
                "reconnect max attempts must be at least 1".into(),
            ));
        }
        Ok(Self {
            delays,
            max_attempts,
        })
    }

    /// Delay after the `failures`-th consecutive failure (1-based).
    pub fn delay_for(&self, failures: u32) -> Duration {
        let idx = (failures.saturating_sub(1) as usize).min(self.delays.len().saturating_sub(1));
        self.delays.get(idx).copied().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// ReconnectController
// ---------------------------------------------------------------------------

pub struct ReconnectController {
    policy: ReconnectPolicy,
    state: ConnectionState,
    failures: u32,
    state_tx: watch::Sender<ConnectionState>,
}

impl ReconnectController {
    pub fn new(policy: ReconnectPolicy) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            policy,
            state: ConnectionState::Disconnected,
            failures: 0,
            state_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failures since the last successful connection.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Start a connection from Disconnected. Returns `false` (and does
    /// nothing) when a connection is already live or in progress.
    pub fn connect(&mut self) -> bool {
        if self.state != ConnectionState::Disconnected {
            tracing::debug!(state = %self.state, "Connect ignored, channel already active");
            return false;
        }
        self.failures = 0;
        self.transition(ConnectionState::Connecting);
        true
    }

    /// The transport handshake succeeded.
    pub fn on_connected(&mut self) {
        if self.state == ConnectionState::Disconnected {
            tracing::debug!("Connected after disconnect() was requested; ignoring");
            return;
        }
        self.failures = 0;
        self.transition(ConnectionState::Connected);
    }

    /// The connection closed or a (re)connect attempt failed.
    ///
    /// Returns the delay before the next retry, or `None` when the attempt
    /// budget is exhausted (the state is then Disconnected and only a
    /// manual `connect()` resumes) or the channel was already Disconnected.
    pub fn on_connection_lost(&mut self) -> Option<Duration> {
        if self.state == ConnectionState::Disconnected {
            return None;
        }

        self.failures += 1;
        if self.failures >= self.policy.max_attempts {
            tracing::warn!(
                failures = self.failures,
                max_attempts = self.policy.max_attempts,
                "Reconnect attempts exhausted, giving up",
            );
            self.transition(ConnectionState::Disconnected);
            return None;
        }

        let delay = self.policy.delay_for(self.failures);
        tracing::info!(
            failures = self.failures,
            delay_ms = delay.as_millis() as u64,
            "Connection lost, scheduling reconnect",
        );
        self.transition(ConnectionState::Reconnecting);
        Some(delay)
    }

    /// Manual teardown. Idempotent.
    pub fn disconnect(&mut self) {
        self.failures = 0;
        if self.state != ConnectionState::Disconnected {
            self.transition(ConnectionState::Disconnected);
        }
    }

    fn transition(&mut self, to: ConnectionState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        tracing::info!(from = %from, to = %to, failures = self.failures, "Connection state changed");
        self.state_tx.send_replace(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> ReconnectController {
        ReconnectController::new(ReconnectPolicy::default())
    }

    #[test]
    fn starts_disconnected() {
        let c = controller();
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert_eq!(c.failures(), 0);
    }

    #[test]
    fn connect_then_connected() {
        let mut c = controller();
        let rx = c.subscribe();

        assert!(c.connect());
        assert_eq!(c.state(), ConnectionState::Connecting);
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);

        c.on_connected();
        assert_eq!(c.state(), ConnectionState::Connected);
        assert_eq!(*rx.borrow(), ConnectionState::Connected);
    }

    #[test]
    fn connect_while_active_is_ignored() {
        let mut c = controller();
        c.connect();
        c.on_connected();
        assert!(!c.connect());
        assert_eq!(c.state(), ConnectionState::Connected);
    }

    #[test]
    fn delays_follow_schedule() {
        let mut c = controller();
        c.connect();
        c.on_connected();

        assert_eq!(c.on_connection_lost(), Some(Duration::ZERO));
        assert_eq!(c.state(), ConnectionState::Reconnecting);
        assert_eq!(c.on_connection_lost(), Some(Duration::from_secs(2)));
        assert_eq!(c.on_connection_lost(), Some(Duration::from_secs(5)));
        assert_eq!(c.on_connection_lost(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn five_consecutive_closes_end_disconnected() {
        let mut c = controller();
        c.connect();
        c.on_connected();

        for _ in 0..4 {
            assert!(c.on_connection_lost().is_some());
        }
        assert_eq!(c.on_connection_lost(), None);
        assert_eq!(c.state(), ConnectionState::Disconnected);

        // No further automatic retries.
        assert_eq!(c.on_connection_lost(), None);
        assert_eq!(c.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn successful_reconnect_resets_budget() {
        let mut c = controller();
        c.connect();
        c.on_connected();

        for _ in 0..4 {
            c.on_connection_lost();
        }
        c.on_connected();
        assert_eq!(c.failures(), 0);

        assert_eq!(c.on_connection_lost(), Some(Duration::ZERO));
    }

    #[test]
    fn manual_connect_after_exhaustion() {
        let mut c = ReconnectController::new(ReconnectPolicy::new(vec![Duration::ZERO], 1).unwrap());
        c.connect();
        assert_eq!(c.on_connection_lost(), None);
        assert_eq!(c.state(), ConnectionState::Disconnected);

        assert!(c.connect());
        assert_eq!(c.state(), ConnectionState::Connecting);
    }

    #[test]
    fn disconnect_is_idempotent_and_terminal() {
        let mut c = controller();
        c.connect();
        c.on_connected();

        c.disconnect();
        c.disconnect();
        assert_eq!(c.state(), ConnectionState::Disconnected);

        // A late handshake or close after teardown changes nothing.
        c.on_connected();
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert_eq!(c.on_connection_lost(), None);
    }

    #[test]
    fn last_delay_repeats() {
        let policy = ReconnectPolicy::new(
            vec![Duration::from_secs(1), Duration::from_secs(3)],
            10,
        )
        .unwrap();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(3));
        assert_eq!(policy.delay_for(7), Duration::from_secs(3));
    }

    #[test]
    fn invalid_policies_rejected() {
        assert!(ReconnectPolicy::new(Vec::new(), 5).is_err());
        assert!(ReconnectPolicy::new(vec![Duration::ZERO], 0).is_err());
    }
}
