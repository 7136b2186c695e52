//! Local nonce sequencing on top of the node's pending count.
//!
//! The node's pending count can lag behind transactions this process just
//! submitted, so the last issued nonce per address acts as a monotonic floor.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::Address;

use crate::blockchain::endpoint::NodeEndpoint;
use crate::blockchain::types::ForwardingError;
use crate::observability::metrics;

/// Issues strictly increasing nonces per address for the life of the process.
#[derive(Debug)]
pub struct NonceSequencer {
    endpoint: NodeEndpoint,
    last_issued: Mutex<HashMap<Address, u64>>,
    retry_delay: Duration,
}

impl NonceSequencer {
    pub fn new(endpoint: NodeEndpoint, retry_delay: Duration) -> Self {
        Self {
            endpoint,
            last_issued: Mutex::new(HashMap::new()),
            retry_delay,
        }
    }

    /// Next nonce for `address`.
    ///
    /// Query failures are retried after a fixed delay until the node answers;
    /// callers never see them.
    pub async fn next_nonce(&self, address: Address) -> u64 {
        let pending = loop {
            match self.endpoint.rpc().pending_transaction_count(address).await {
                Ok(count) => break count,
                Err(e) => {
                    let err = ForwardingError::NonceAcquisition(e.to_string());
                    tracing::warn!(
                        address = %address,
                        error = %err,
                        retry_in_ms = self.retry_delay.as_millis() as u64,
                        "Retrying nonce query"
                    );
                    metrics::record_nonce_retry();
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        };

        self.issue(address, pending)
    }

    /// Reconcile a remote pending count with the local floor and record it.
    fn issue(&self, address: Address, pending: u64) -> u64 {
        let mut last_issued = self
            .last_issued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let nonce = match last_issued.get(&address) {
            Some(&last) if last >= pending => last + 1,
            _ => pending,
        };
        if nonce != pending {
            tracing::debug!(
                address = %address,
                remote = pending,
                issued = nonce,
                "Remote pending count lags local sequence"
            );
        }
        last_issued.insert(address, nonce);
        nonce
    }

    /// Last nonce handed out for `address`, if any.
    pub fn last_issued(&self, address: Address) -> Option<u64> {
        self.last_issued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&address)
            .copied()
    }
}
