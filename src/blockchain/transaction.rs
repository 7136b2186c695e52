//! Forwarding transaction lifecycle.
//!
//! A [`PendingTransaction`] is created by the forwarding engine, walks
//! `Built → Signed → Submitted → {Confirmed, Failed, TimedOut}` and is dropped
//! once terminal. Nothing is persisted: the nonce floor kept by the
//! sequencer is what prevents reuse.

use alloy::consensus::TxLegacy;
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};

use crate::blockchain::types::{BlockchainResult, ForwardingError};
use crate::blockchain::wallet::Wallet;

/// Where a forwarding transaction is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Built,
    Signed,
    Submitted,
    Confirmed,
    Failed,
    TimedOut,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::TimedOut)
    }
}

/// A forwarding transaction owned by the engine until it resolves.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub payload: Bytes,
    pub raw: Option<Bytes>,
    pub hash: Option<TxHash>,
    pub status: TxStatus,
}

impl PendingTransaction {
    pub fn build(
        nonce: u64,
        to: Address,
        value: U256,
        gas_price: u128,
        gas_limit: u64,
        payload: Bytes,
    ) -> Self {
        Self {
            nonce,
            to,
            value,
            gas_price,
            gas_limit,
            payload,
            raw: None,
            hash: None,
            status: TxStatus::Built,
        }
    }

    /// Sign locally; the hash is known from here on.
    pub fn sign(&mut self, wallet: &Wallet) -> BlockchainResult<()> {
        let tx = TxLegacy {
            chain_id: Some(wallet.chain_id()),
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            to: TxKind::Call(self.to),
            value: self.value,
            input: self.payload.clone(),
        };
        let signed = wallet.sign_legacy(tx)?;
        self.hash = Some(signed.hash);
        self.raw = Some(signed.raw);
        self.status = TxStatus::Signed;
        Ok(())
    }

    /// Signed bytes ready for broadcast.
    pub fn raw(&self) -> Result<&Bytes, ForwardingError> {
        self.raw
            .as_ref()
            .ok_or_else(|| ForwardingError::Submission("transaction not signed".to_string()))
    }

    pub fn mark(&mut self, status: TxStatus) {
        tracing::debug!(
            nonce = self.nonce,
            tx_hash = ?self.hash,
            from = ?self.status,
            to = ?status,
            "Transaction status change"
        );
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_sign_transitions_to_signed() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();
        let mut tx = PendingTransaction::build(
            3,
            Address::ZERO,
            U256::from(10u64),
            1,
            21_000,
            Bytes::new(),
        );
        assert!(tx.raw().is_err());

        tx.sign(&wallet).unwrap();
        assert_eq!(tx.status, TxStatus::Signed);
        assert!(tx.hash.is_some());
        assert!(tx.raw().is_ok());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TxStatus::Confirmed.is_terminal());
        assert!(TxStatus::Failed.is_terminal());
        assert!(TxStatus::TimedOut.is_terminal());
        assert!(!TxStatus::Submitted.is_terminal());
    }
}
