//! Fixed-cadence status polling that feeds the forwarding engine.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;

use crate::blockchain::BlockchainResult;
use crate::forwarding::{BalanceSnapshot, EngineHandle};
use crate::lifecycle::ScheduledTask;
use crate::observability::metrics;
use crate::status::board::StatusBoard;
use crate::status::oracle::{StatusOracle, StatusSnapshot};

/// Polls the oracle and publishes each answer.
///
/// Every successful poll gets the next sequence number, which travels with
/// the balance so the engine can tell fresh observations from repeats.
pub struct StatusPoller {
    oracle: Arc<dyn StatusOracle>,
    phase: u8,
    eth_address: Address,
    btc_address: String,
    engine: Option<EngineHandle>,
    board: StatusBoard,
    sequence: u64,
}

impl StatusPoller {
    pub fn new(
        oracle: Arc<dyn StatusOracle>,
        phase: u8,
        eth_address: Address,
        btc_address: String,
        board: StatusBoard,
    ) -> Self {
        Self {
            oracle,
            phase,
            eth_address,
            btc_address,
            engine: None,
            board,
            sequence: 0,
        }
    }

    /// Forward each observed balance to `engine`.
    pub fn with_engine(mut self, engine: EngineHandle) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Query once, publish the snapshot and feed the engine.
    pub async fn poll_once(&mut self) -> BlockchainResult<StatusSnapshot> {
        let result = self
            .oracle
            .query_status(self.phase, self.eth_address, &self.btc_address)
            .await;

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                metrics::record_status_poll("error");
                return Err(e);
            }
        };
        metrics::record_status_poll("ok");

        self.sequence += 1;
        let observation = BalanceSnapshot {
            amount: snapshot.fwd_balance,
            observed_at_poll_sequence: self.sequence,
        };

        self.board.update(|s| {
            s.status = Some(snapshot.clone());
            s.last_balance = Some(observation.amount);
            s.last_poll_sequence = Some(observation.observed_at_poll_sequence);
        });

        if let Some(engine) = &self.engine {
            if let Err(e) = engine.balance_observed(observation).await {
                tracing::error!(error = %e, "Forwarding engine is gone, dropping balance");
            }
        }

        Ok(snapshot)
    }

    /// Poll every `interval` (measured from the end of each poll) until stopped.
    pub fn start(mut self, interval: Duration) -> ScheduledTask {
        ScheduledTask::spawn("status-poller", move |mut stop| async move {
            tracing::info!(
                interval_ms = interval.as_millis() as u64,
                phase = self.phase,
                "Status poller starting"
            );
            loop {
                tokio::select! {
                    result = self.poll_once() => {
                        if let Err(e) = result {
                            tracing::warn!(error = %e, "Status poll failed, will retry");
                        }
                    }
                    _ = stop.recv() => break,
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop.recv() => break,
                }
            }
            tracing::info!("Status poller stopped");
        })
    }
}
