//! Persistent pipeline status exposed to observers.
//!
//! Flags stay set until recovery clears them; observers read the latest
//! value at any time or `subscribe` to be woken on change.

use std::sync::Arc;

use alloy::primitives::{TxHash, U256};
use serde::Serialize;
use tokio::sync::watch;

use crate::forwarding::ArmState;
use crate::health::{ConnectionListener, ListenerError};
use crate::status::oracle::StatusSnapshot;

/// Everything an observer can see about the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStatus {
    pub eth_connected: bool,
    pub btc_connected: bool,
    pub arm_state: ArmState,
    pub last_balance: Option<U256>,
    pub last_poll_sequence: Option<u64>,
    pub forwarding_error: Option<String>,
    pub last_forward_tx: Option<TxHash>,
    pub btc_forwarding_error: Option<String>,
    pub last_btc_forward_tx: Option<String>,
    pub status: Option<StatusSnapshot>,
}

/// Single writer-side handle to the shared [`PipelineStatus`].
#[derive(Clone)]
pub struct StatusBoard {
    tx: Arc<watch::Sender<PipelineStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(PipelineStatus::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> PipelineStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineStatus> {
        self.tx.subscribe()
    }

    pub fn update(&self, f: impl FnOnce(&mut PipelineStatus)) {
        self.tx.send_if_modified(|status| {
            let before = status.clone();
            f(status);
            *status != before
        });
    }

    pub fn set_eth_connected(&self, connected: bool) {
        self.update(|s| s.eth_connected = connected);
    }

    pub fn set_btc_connected(&self, connected: bool) {
        self.update(|s| s.btc_connected = connected);
    }

    pub fn set_arm_state(&self, arm_state: ArmState) {
        self.update(|s| s.arm_state = arm_state);
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionListener for StatusBoard {
    fn on_connected(&self) -> Result<(), ListenerError> {
        self.set_eth_connected(true);
        Ok(())
    }

    fn on_disconnected(&self, _reason: &str) -> Result<(), ListenerError> {
        self.set_eth_connected(false);
        Ok(())
    }
}
