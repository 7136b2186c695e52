//! Connectivity checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active checks (active.rs):
//!     Delay elapses (or endpoint swapped)
//!     → ping current node, tagged with the current generation
//!     → stale generation? drop result
//!     → otherwise update state.rs, fire listener on edges
//! ```
//!
//! # Design Decisions
//! - A single failed ping flips to disconnected; a single success flips back
//! - Listener failures are logged and never stop the loop
//! - The loop reschedules unconditionally until stopped

pub mod active;
pub mod state;

pub use active::{ConnectivityHandle, ConnectivityMonitor, PingOutcome};
pub use state::{ConnectionListener, ConnectivityState, ListenerError};
