//! Account-chain forwarding.
//!
//! # Data Flow
//! ```text
//! status poller → EngineHandle → engine task
//!     → arm.rs (may we forward?)
//!     → engine.rs (threshold → nonce → sign → broadcast → confirm)
//!     → StatusBoard (arm state, errors, last tx)
//! ```

pub mod arm;
pub mod engine;

pub use arm::{ArmState, BalanceSnapshot};
pub use engine::{
    engine_channel, EngineCommand, EngineGone, EngineHandle, ForwardOutcome, ForwardingEngine,
    ForwardingSettings, SkipReason,
};
