//! UTXO-chain forwarding.
//!
//! # Data Flow
//! ```text
//! explorer.rs (unspent outputs)
//!     → transaction.rs (dry run → fee × safety multiplier → sweep → sign)
//!     → explorer.rs (broadcast)
//!     → worker.rs publishes btc_connected / errors to the StatusBoard
//! ```

pub mod explorer;
pub mod transaction;
pub mod types;
pub mod worker;

pub use explorer::{EsploraClient, UtxoExplorer};
pub use transaction::UtxoSigner;
pub use types::{SweepOutcome, SweepReceipt, Utxo, UtxoError};
pub use worker::{UtxoForwardingWorker, UtxoSettings};
