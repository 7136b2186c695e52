//! Connectivity state and its edge-triggered listener.
//!
//! # State Transitions
//! ```text
//! Disconnected → Connected:    successful ping (fires on_connected)
//! Connected    → Disconnected: failed ping (fires on_disconnected)
//! ```
//! Repeated results in the same state fire nothing. A result carrying a
//! generation older than the current one is dropped without effect.

use serde::Serialize;

/// Error returned by a listener callback. Logged and swallowed by the monitor.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Receiver of connectivity edges.
pub trait ConnectionListener: Send + Sync {
    fn on_connected(&self) -> Result<(), ListenerError>;
    fn on_disconnected(&self, reason: &str) -> Result<(), ListenerError>;
}

/// Snapshot of the monitor's view of the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectivityState {
    pub connected: bool,
    pub consecutive_failures: u32,
    /// Bumped on every endpoint swap; pings from older generations are ignored.
    pub generation: u64,
}

/// Edge produced by applying a ping result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    None,
    Connected,
    Disconnected(String),
}

impl ConnectivityState {
    /// Transition implied by a ping result, without applying it.
    pub fn transition_for(&self, result: &Result<(), String>) -> Transition {
        match (self.connected, result) {
            (false, Ok(())) => Transition::Connected,
            (true, Err(reason)) => Transition::Disconnected(reason.clone()),
            _ => Transition::None,
        }
    }

    /// Fold a ping result into the state.
    pub fn record(&mut self, result: &Result<(), String>) {
        match result {
            Ok(()) => {
                self.connected = true;
                self.consecutive_failures = 0;
            }
            Err(_) => {
                self.connected = false;
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            }
        }
    }
}
