//! Stop signalling for long-running loops.

use tokio::sync::broadcast;

/// Broadcast stop signal shared by a set of tasks.
///
/// Every [`ScheduledTask`] holds its own, so a single loop can be stopped
/// in isolation; the admin server shares one with the daemon.
///
/// [`ScheduledTask`]: crate::lifecycle::ScheduledTask
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the stop signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the stop signal. Subscribers created afterwards will not see it.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
