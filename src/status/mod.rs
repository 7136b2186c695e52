//! External status intake and observer-facing status.
//!
//! # Data Flow
//! ```text
//! poller.rs (fixed delay)
//!     → oracle.rs (getStatus, positional tuple)
//!     → board.rs (persistent flags for observers)
//!     → forwarding engine (BalanceSnapshot with poll sequence)
//! ```

pub mod board;
pub mod oracle;
pub mod poller;

pub use board::{PipelineStatus, StatusBoard};
pub use oracle::{ContractStatusOracle, StatusOracle, StatusSnapshot};
pub use poller::StatusPoller;
