//! Chain-specific types and error definitions.

use alloy::primitives::{TxHash, U256};
use serde::Serialize;
use thiserror::Error;

pub use crate::config::schema::NodeConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors that can occur talking to the account-chain node.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Invalid private key format or signing failure.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Response could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// Forwarding failures, by how they must be handled.
///
/// `Connectivity` and `NonceAcquisition` are absorbed by the owning loop.
/// Everything else means a transaction was, or may have been, broadcast and
/// disarms forwarding until fresh data or an operator retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ForwardingError {
    #[error("node unreachable: {0}")]
    Connectivity(String),

    #[error("could not acquire nonce: {0}")]
    NonceAcquisition(String),

    #[error("node rejected transaction: {0}")]
    Submission(String),

    #[error("transaction {0} not confirmed before deadline")]
    ConfirmationTimeout(TxHash),

    #[error("transaction {tx_hash} failed on-chain (gas used {gas_used} of {gas_limit})")]
    ExecutionFailure {
        tx_hash: TxHash,
        gas_used: u64,
        gas_limit: u64,
    },

    #[error("balance {amount} cannot cover gas reserve {reserve}")]
    InsufficientValue { amount: U256, reserve: U256 },
}

impl ForwardingError {
    /// Whether a transaction may have reached the network.
    pub fn may_have_broadcast(&self) -> bool {
        matches!(
            self,
            Self::Submission(_) | Self::ConfirmationTimeout(_) | Self::ExecutionFailure { .. }
        )
    }
}

/// The slice of a transaction receipt the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// Explicit execution status when the node reports one.
    pub status: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_conversion() {
        let chain_id = ChainId::from(1u64);
        assert_eq!(chain_id.0, 1);
        assert_eq!(u64::from(chain_id), 1);
    }

    #[test]
    fn test_error_display() {
        let err = BlockchainError::Timeout(10);
        assert_eq!(err.to_string(), "RPC timeout after 10 seconds");

        let err = ForwardingError::InsufficientValue {
            amount: U256::from(5),
            reserve: U256::from(7),
        };
        assert!(err.to_string().contains("reserve 7"));
    }

    #[test]
    fn test_broadcast_classification() {
        assert!(ForwardingError::Submission("nonce too low".into()).may_have_broadcast());
        assert!(ForwardingError::ConfirmationTimeout(TxHash::ZERO).may_have_broadcast());
        assert!(!ForwardingError::Connectivity("refused".into()).may_have_broadcast());
        assert!(!ForwardingError::NonceAcquisition("refused".into()).may_have_broadcast());
    }
}
