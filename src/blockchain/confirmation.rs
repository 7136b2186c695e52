//! Receipt polling with a deadline.

use std::time::Duration;

use alloy::primitives::TxHash;
use futures_util::future::join_all;

use crate::blockchain::endpoint::NodeEndpoint;
use crate::blockchain::types::TxReceipt;
use crate::observability::metrics;

/// How a submitted transaction resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// Mined and executed successfully.
    Confirmed(TxReceipt),
    /// Mined but reverted or ran out of gas.
    OutOfGas(TxReceipt),
    /// No receipt before the deadline. The transaction may still land.
    TimedOut,
    /// The node could not be reached while polling.
    ConnectionError(String),
}

impl ConfirmationOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Confirmed(_) => "confirmed",
            Self::OutOfGas(_) => "out_of_gas",
            Self::TimedOut => "timed_out",
            Self::ConnectionError(_) => "connection_error",
        }
    }
}

/// Classify a receipt.
///
/// An explicit status field wins. Without one, consuming the whole gas limit
/// is taken as a revert.
pub fn classify_receipt(receipt: TxReceipt, gas_limit: u64) -> ConfirmationOutcome {
    let succeeded = match receipt.status {
        Some(status) => status,
        None => receipt.gas_used < gas_limit,
    };
    if succeeded {
        ConfirmationOutcome::Confirmed(receipt)
    } else {
        ConfirmationOutcome::OutOfGas(receipt)
    }
}

/// Polls the node for receipts.
#[derive(Debug, Clone)]
pub struct ConfirmationWaiter {
    endpoint: NodeEndpoint,
}

impl ConfirmationWaiter {
    pub fn new(endpoint: NodeEndpoint) -> Self {
        Self { endpoint }
    }

    /// Wait for `tx_hash` to resolve.
    ///
    /// Elapsed time is accumulated per empty poll, so a slow node stretches
    /// the wall-clock deadline rather than cutting polls short.
    pub async fn await_confirmation(
        &self,
        tx_hash: TxHash,
        gas_limit: u64,
        poll_interval: Duration,
        timeout: Duration,
    ) -> ConfirmationOutcome {
        let mut elapsed = Duration::ZERO;

        let outcome = loop {
            tokio::time::sleep(poll_interval).await;

            match self.endpoint.rpc().transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => break classify_receipt(receipt, gas_limit),
                Ok(None) => {
                    elapsed += poll_interval;
                    if elapsed >= timeout {
                        break ConfirmationOutcome::TimedOut;
                    }
                    tracing::debug!(
                        tx_hash = %tx_hash,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Transaction pending"
                    );
                }
                Err(e) => break ConfirmationOutcome::ConnectionError(e.to_string()),
            }
        };

        metrics::record_confirmation(outcome.label());
        outcome
    }

    /// Wait for several transactions concurrently; resolves once all have.
    ///
    /// Each entry is `(hash, gas_limit)`; outcomes come back in input order.
    pub async fn await_all(
        &self,
        transactions: &[(TxHash, u64)],
        poll_interval: Duration,
        timeout: Duration,
    ) -> Vec<ConfirmationOutcome> {
        join_all(transactions.iter().map(|(hash, gas_limit)| {
            self.await_confirmation(*hash, *gas_limit, poll_interval, timeout)
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(gas_used: u64, status: Option<bool>) -> TxReceipt {
        TxReceipt {
            tx_hash: TxHash::ZERO,
            block_number: Some(1),
            gas_used,
            status,
        }
    }

    #[test]
    fn test_gas_heuristic_without_status() {
        assert!(matches!(
            classify_receipt(receipt(21_000, None), 200_000),
            ConfirmationOutcome::Confirmed(_)
        ));
        assert!(matches!(
            classify_receipt(receipt(200_000, None), 200_000),
            ConfirmationOutcome::OutOfGas(_)
        ));
    }

    #[test]
    fn test_explicit_status_overrides_heuristic() {
        // Exactly exhausting the limit is fine when the node says so.
        assert!(matches!(
            classify_receipt(receipt(200_000, Some(true)), 200_000),
            ConfirmationOutcome::Confirmed(_)
        ));
        // A revert well under the limit is still a failure.
        assert!(matches!(
            classify_receipt(receipt(30_000, Some(false)), 200_000),
            ConfirmationOutcome::OutOfGas(_)
        ));
    }
}
