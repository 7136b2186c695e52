//! UTXO-chain types and error definitions.

use bitcoin::Txid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One spendable output of the watched address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: Txid,
    #[serde(rename = "vout")]
    pub output_index: u32,
    #[serde(rename = "value")]
    pub satoshi_value: u64,
}

#[derive(Debug, Error)]
pub enum UtxoError {
    /// Explorer unreachable or returned garbage.
    #[error("explorer error: {0}")]
    Explorer(String),

    /// Explorer reachable but refused the transaction.
    #[error("explorer rejected transaction: {0}")]
    Rejected(String),

    #[error("outputs total {total} sats cannot pay fee {fee} sats")]
    InsufficientValue { total: u64, fee: u64 },

    #[error("transaction build failed: {0}")]
    Build(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("address error: {0}")]
    Address(String),
}

impl UtxoError {
    /// Whether this reflects explorer reachability rather than the sweep.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Explorer(_))
    }
}

/// Result of one successful sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReceipt {
    pub txid: Txid,
    pub inputs: usize,
    pub total: u64,
    pub fee: u64,
    pub forwarded: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    NothingToSweep,
    Swept(SweepReceipt),
}
