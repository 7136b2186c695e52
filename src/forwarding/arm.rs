//! Forwarding readiness state and the balance it is judged against.
//!
//! # State Transitions
//! ```text
//! Armed      → Submitting: balance >= minimum forward amount
//! Submitting → Armed:      confirmed receipt
//! Submitting → Disarmed:   any submission or confirmation error
//! Disarmed   → Armed:      a balance different from the one at failure,
//!                          or an explicit operator retry
//! ```

use alloy::primitives::U256;
use serde::Serialize;

/// Whether the engine may start a forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ArmState {
    /// May attempt a forward on the next observation.
    #[default]
    Armed,
    /// A transaction is in flight; further attempts are rejected.
    Submitting,
    /// A forward failed; waiting for a balance that differs from this one.
    DisarmedAwaitingFreshData { balance_at_failure: U256 },
}

impl ArmState {
    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed)
    }

    /// Whether `amount` is fresh enough to re-arm a disarmed engine.
    pub fn rearms_on(&self, amount: U256) -> bool {
        match self {
            Self::DisarmedAwaitingFreshData { balance_at_failure } => amount != *balance_at_failure,
            _ => false,
        }
    }
}

/// Last balance used for forwarding decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    pub amount: U256,
    pub observed_at_poll_sequence: u64,
}
