//! Account-chain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key) + [node] config
//!     → wallet.rs (key loading, signing)
//!     → client.rs (RPC connection with timeouts, NodeRpc)
//!     → endpoint.rs (swappable node shared by every component)
//!     → nonce.rs (monotonic nonce over the node's pending count)
//!     → transaction.rs + payload.rs (build, sign)
//!     → confirmation.rs (receipt polling with deadline)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when the node is unreachable

pub mod client;
pub mod confirmation;
pub mod endpoint;
pub mod nonce;
pub mod payload;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{BlockchainClient, NodeRpc};
pub use confirmation::{ConfirmationOutcome, ConfirmationWaiter};
pub use endpoint::NodeEndpoint;
pub use nonce::NonceSequencer;
pub use transaction::{PendingTransaction, TxStatus};
pub use types::{BlockchainError, BlockchainResult, ChainId, ForwardingError, NodeConfig, TxReceipt};
pub use wallet::Wallet;
