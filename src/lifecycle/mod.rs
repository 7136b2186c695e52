//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Loops (task.rs):
//!     ScheduledTask::every → cycle → sleep → cycle ... until its own stop fires
//!
//! Shutdown (shutdown.rs):
//!     Signal received → every task's stop → tasks exit → process exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod task;

pub use shutdown::Shutdown;
pub use task::ScheduledTask;
