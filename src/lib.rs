//! Donation forwarding daemon.
//!
//! Watches a forwarding account on an account-based chain and a deposit
//! address on a UTXO chain, and sweeps whatever arrives to fixed destination
//! contracts/addresses with a payload linking the funds to a donor identity.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────┐  balance   ┌──────────────────┐  raw tx   ┌──────────┐
//!   │ StatusPoller │──────────▶│ ForwardingEngine │─────────▶│   node   │
//!   └──────┬───────┘  (mpsc)    └────────┬─────────┘           └────▲─────┘
//!          │                             │ arm state, errors        │ ping
//!          ▼                             ▼                          │
//!   ┌──────────────────────────────────────────┐          ┌─────────┴──────────┐
//!   │               StatusBoard                │◀─────────│ ConnectivityMonitor │
//!   └──────────────────────▲───────────────────┘          └────────────────────┘
//!                          │ btc_connected, errors
//!                 ┌────────┴─────────────┐   utxos/fee/tx   ┌──────────┐
//!                 │ UtxoForwardingWorker │────────────────▶│ explorer │
//!                 └──────────────────────┘                  └──────────┘
//! ```

pub mod admin;
pub mod blockchain;
pub mod config;
pub mod forwarding;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod status;
pub mod utxo;

pub use config::ForwarderConfig;
pub use lifecycle::Shutdown;
