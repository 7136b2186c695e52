//! Account-chain forwarding engine.
//!
//! Balance observations arrive from the status poller; each one may trigger
//! a forward of `balance - gas reserve` to the destination contract. A failed
//! forward disarms the engine until a different balance is observed or an
//! operator retries, so a stale balance view can never be spent on gas twice.

use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::blockchain::confirmation::ConfirmationOutcome;
use crate::blockchain::payload::donation_calldata;
use crate::blockchain::{
    ConfirmationWaiter, ForwardingError, NodeEndpoint, NonceSequencer, PendingTransaction,
    TxStatus, Wallet,
};
use crate::config::validation::ValidationError;
use crate::config::ForwardingConfig;
use crate::forwarding::arm::{ArmState, BalanceSnapshot};
use crate::health::ConnectivityHandle;
use crate::lifecycle::ScheduledTask;
use crate::observability::metrics;
use crate::status::StatusBoard;

const WEI_PER_GWEI: u64 = 1_000_000_000;

/// Parsed, unit-converted forwarding parameters.
#[derive(Debug, Clone)]
pub struct ForwardingSettings {
    pub destination: Address,
    pub identity: Address,
    pub include_checksum: bool,
    /// Gas price in wei.
    pub gas_price: u128,
    pub gas_limit: u64,
    /// Smallest donation worth forwarding, in wei.
    pub min_donation: U256,
    pub confirmation_poll: Duration,
    pub confirmation_timeout: Duration,
    pub nonce_retry: Duration,
}

impl ForwardingSettings {
    pub fn from_config(config: &ForwardingConfig) -> Result<Self, ValidationError> {
        let destination = Address::from_str(&config.destination)
            .map_err(|_| ValidationError::new("forwarding.destination", "not a valid address"))?;
        let identity = Address::from_str(&config.identity)
            .map_err(|_| ValidationError::new("forwarding.identity", "not a valid address"))?;

        Ok(Self {
            destination,
            identity,
            include_checksum: config.include_checksum,
            gas_price: config.gas_price_gwei as u128 * WEI_PER_GWEI as u128,
            gas_limit: config.gas_limit,
            min_donation: U256::from(config.min_donation_gwei) * U256::from(WEI_PER_GWEI),
            confirmation_poll: Duration::from_millis(config.confirmation_poll_ms),
            confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
            nonce_retry: Duration::from_millis(config.nonce_retry_ms),
        })
    }

    /// Worst-case gas cost of one forward, reserved out of the balance.
    pub fn max_gas_cost(&self) -> U256 {
        U256::from(self.gas_price) * U256::from(self.gas_limit)
    }

    /// Minimum donation plus the gas reserve.
    pub fn min_forward_amount(&self) -> U256 {
        self.min_donation + self.max_gas_cost()
    }
}

/// Why an attempt did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotArmed,
    Disconnected,
    ZeroBalance,
    NoObservation,
    StaleObservation,
}

/// Result of one pass through the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    Skipped(SkipReason),
    /// Below the minimum; `logged` is false for a repeat of the same amount.
    TooSmall { amount: U256, logged: bool },
    Forwarded {
        tx_hash: TxHash,
        nonce: u64,
        value: U256,
    },
    Failed(ForwardingError),
}

impl ForwardOutcome {
    /// Whether the engine passed through `Submitting` on this pass.
    pub fn went_in_flight(&self) -> bool {
        matches!(self, Self::Forwarded { .. } | Self::Failed(_))
    }
}

/// Input to the engine task.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    BalanceObserved(BalanceSnapshot),
    Retry,
}

#[derive(Debug, Error)]
#[error("forwarding engine stopped")]
pub struct EngineGone;

/// Sender side of the engine's command queue.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    pub async fn balance_observed(&self, snapshot: BalanceSnapshot) -> Result<(), EngineGone> {
        self.tx
            .send(EngineCommand::BalanceObserved(snapshot))
            .await
            .map_err(|_| EngineGone)
    }

    /// Operator re-arm after a reported error.
    pub async fn retry(&self) -> Result<(), EngineGone> {
        self.tx.send(EngineCommand::Retry).await.map_err(|_| EngineGone)
    }
}

/// Create the command queue connecting producers to the engine task.
pub fn engine_channel(capacity: usize) -> (EngineHandle, mpsc::Receiver<EngineCommand>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EngineHandle { tx }, rx)
}

/// Owns the forwarding account and decides when to forward.
pub struct ForwardingEngine {
    settings: ForwardingSettings,
    wallet: Wallet,
    endpoint: NodeEndpoint,
    connectivity: ConnectivityHandle,
    nonces: NonceSequencer,
    confirmations: ConfirmationWaiter,
    board: StatusBoard,
    arm: ArmState,
    snapshot: Option<BalanceSnapshot>,
    /// Below-threshold amount already reported, to keep the log quiet.
    too_small_noted: Option<U256>,
    /// Highest poll sequence queued while a forward was in flight.
    in_flight_floor: u64,
}

impl ForwardingEngine {
    pub fn new(
        settings: ForwardingSettings,
        wallet: Wallet,
        endpoint: NodeEndpoint,
        connectivity: ConnectivityHandle,
        board: StatusBoard,
    ) -> Self {
        let nonces = NonceSequencer::new(endpoint.clone(), settings.nonce_retry);
        let confirmations = ConfirmationWaiter::new(endpoint.clone());
        board.set_arm_state(ArmState::Armed);

        Self {
            settings,
            wallet,
            endpoint,
            connectivity,
            nonces,
            confirmations,
            board,
            arm: ArmState::Armed,
            snapshot: None,
            too_small_noted: None,
            in_flight_floor: 0,
        }
    }

    pub fn arm_state(&self) -> ArmState {
        self.arm
    }

    pub fn snapshot(&self) -> Option<BalanceSnapshot> {
        self.snapshot
    }

    pub fn settings(&self) -> &ForwardingSettings {
        &self.settings
    }

    pub fn nonces(&self) -> &NonceSequencer {
        &self.nonces
    }

    fn set_arm(&mut self, arm: ArmState) {
        if self.arm != arm {
            tracing::debug!(from = ?self.arm, to = ?arm, "Forwarding arm state change");
        }
        self.arm = arm;
        self.board.set_arm_state(arm);
    }

    /// Record a new balance from the status poller and try to forward it.
    pub async fn on_balance_observed(&mut self, observation: BalanceSnapshot) -> ForwardOutcome {
        let newest = self
            .snapshot
            .map_or(0, |s| s.observed_at_poll_sequence)
            .max(self.in_flight_floor);
        let seen_any = self.snapshot.is_some() || self.in_flight_floor > 0;
        if seen_any && observation.observed_at_poll_sequence <= newest {
            tracing::debug!(
                sequence = observation.observed_at_poll_sequence,
                current = newest,
                "Ignoring out-of-order balance observation"
            );
            return ForwardOutcome::Skipped(SkipReason::StaleObservation);
        }
        self.snapshot = Some(observation);

        if self.arm.rearms_on(observation.amount) {
            tracing::info!(
                balance = %observation.amount,
                sequence = observation.observed_at_poll_sequence,
                "Fresh balance observed, re-arming forwarding"
            );
            self.set_arm(ArmState::Armed);
        }

        self.attempt_forward().await
    }

    /// Operator re-arm after a reported error, followed by an attempt.
    pub async fn retry_forwarding(&mut self) -> ForwardOutcome {
        if let ArmState::DisarmedAwaitingFreshData { .. } = self.arm {
            tracing::info!("Forwarding re-armed by operator");
            self.set_arm(ArmState::Armed);
            self.board.update(|s| s.forwarding_error = None);
        }
        self.attempt_forward().await
    }

    /// Forward the current balance if the engine is armed, connected and the
    /// balance clears the minimum.
    pub async fn attempt_forward(&mut self) -> ForwardOutcome {
        if !self.arm.is_armed() {
            return ForwardOutcome::Skipped(SkipReason::NotArmed);
        }
        if !self.connectivity.is_connected() {
            tracing::debug!("Node disconnected, skipping forwarding attempt");
            return ForwardOutcome::Skipped(SkipReason::Disconnected);
        }
        let Some(snapshot) = self.snapshot else {
            return ForwardOutcome::Skipped(SkipReason::NoObservation);
        };
        let amount = snapshot.amount;
        if amount.is_zero() {
            return ForwardOutcome::Skipped(SkipReason::ZeroBalance);
        }

        let minimum = self.settings.min_forward_amount();
        if amount < minimum {
            let logged = self.too_small_noted != Some(amount);
            if logged {
                tracing::info!(
                    balance = %amount,
                    minimum = %minimum,
                    "Balance too small to forward"
                );
                self.too_small_noted = Some(amount);
                metrics::record_forward_attempt("eth", "too_small");
            }
            return ForwardOutcome::TooSmall { amount, logged };
        }
        self.too_small_noted = None;

        // Claimed before the first await.
        self.set_arm(ArmState::Submitting);

        match self.forward(amount).await {
            Ok((tx_hash, nonce, value)) => {
                self.set_arm(ArmState::Armed);
                self.board.update(|s| s.forwarding_error = None);
                metrics::record_forward_attempt("eth", "forwarded");
                ForwardOutcome::Forwarded {
                    tx_hash,
                    nonce,
                    value,
                }
            }
            Err(e) => {
                let balance_at_failure = self.snapshot.map(|s| s.amount).unwrap_or(amount);
                tracing::error!(
                    error = %e,
                    balance = %balance_at_failure,
                    may_have_broadcast = e.may_have_broadcast(),
                    "Forwarding failed, disarmed until a fresh balance or operator retry"
                );
                self.set_arm(ArmState::DisarmedAwaitingFreshData { balance_at_failure });
                let message = e.to_string();
                self.board.update(|s| s.forwarding_error = Some(message));
                metrics::record_forward_attempt("eth", "failed");
                ForwardOutcome::Failed(e)
            }
        }
    }

    /// Build, sign, broadcast and confirm one forward of `amount`.
    async fn forward(&mut self, amount: U256) -> Result<(TxHash, u64, U256), ForwardingError> {
        let reserve = self.settings.max_gas_cost();
        let value = amount
            .checked_sub(reserve)
            .ok_or(ForwardingError::InsufficientValue { amount, reserve })?;

        let payload = donation_calldata(self.settings.identity, self.settings.include_checksum);
        let nonce = self.nonces.next_nonce(self.wallet.address()).await;

        let mut tx = PendingTransaction::build(
            nonce,
            self.settings.destination,
            value,
            self.settings.gas_price,
            self.settings.gas_limit,
            payload,
        );
        tx.sign(&self.wallet)
            .map_err(|e| ForwardingError::Submission(e.to_string()))?;

        let raw = tx.raw()?.clone();
        let sent = self.endpoint.rpc().send_raw_transaction(&raw).await;
        let tx_hash = match sent {
            Ok(hash) => hash,
            Err(e) => {
                tx.mark(TxStatus::Failed);
                return Err(ForwardingError::Submission(e.to_string()));
            }
        };
        tx.mark(TxStatus::Submitted);
        tracing::info!(
            tx_hash = %tx_hash,
            nonce,
            value = %value,
            destination = %self.settings.destination,
            "Forwarding transaction submitted"
        );
        self.board.update(|s| s.last_forward_tx = Some(tx_hash));

        let outcome = self
            .confirmations
            .await_confirmation(
                tx_hash,
                self.settings.gas_limit,
                self.settings.confirmation_poll,
                self.settings.confirmation_timeout,
            )
            .await;

        match outcome {
            ConfirmationOutcome::Confirmed(receipt) => {
                tx.mark(TxStatus::Confirmed);
                tracing::info!(
                    tx_hash = %tx_hash,
                    block = ?receipt.block_number,
                    gas_used = receipt.gas_used,
                    "Forwarding transaction confirmed"
                );
                Ok((tx_hash, nonce, value))
            }
            ConfirmationOutcome::OutOfGas(receipt) => {
                tx.mark(TxStatus::Failed);
                Err(ForwardingError::ExecutionFailure {
                    tx_hash,
                    gas_used: receipt.gas_used,
                    gas_limit: self.settings.gas_limit,
                })
            }
            ConfirmationOutcome::TimedOut => {
                tx.mark(TxStatus::TimedOut);
                Err(ForwardingError::ConfirmationTimeout(tx_hash))
            }
            ConfirmationOutcome::ConnectionError(reason) => {
                tx.mark(TxStatus::Failed);
                Err(ForwardingError::Connectivity(format!(
                    "lost node while awaiting {}: {}",
                    tx_hash, reason
                )))
            }
        }
    }

    /// Drop commands that queued up while a forward was in flight.
    ///
    /// Balances polled during the flight predate its effect on the wallet,
    /// and a retry sent then was aimed at a state that no longer exists.
    /// Observations up to the highest sequence seen here stay stale for good.
    pub fn discard_in_flight(&mut self, commands: &mut mpsc::Receiver<EngineCommand>) -> usize {
        let mut dropped = 0;
        while let Ok(command) = commands.try_recv() {
            match command {
                EngineCommand::BalanceObserved(snapshot) => {
                    self.in_flight_floor = self
                        .in_flight_floor
                        .max(snapshot.observed_at_poll_sequence);
                }
                EngineCommand::Retry => {
                    tracing::info!("Ignoring retry requested while a forward was in flight");
                }
            }
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(
                dropped,
                stale_through = self.in_flight_floor,
                "Discarded commands queued during forward"
            );
        }
        dropped
    }

    /// Run the engine as a task fed by `commands` until stopped.
    ///
    /// A forward in progress is always driven to completion before the stop
    /// signal is looked at. Whatever queued up meanwhile is discarded.
    pub fn start(mut self, mut commands: mpsc::Receiver<EngineCommand>) -> ScheduledTask {
        ScheduledTask::spawn("forwarding-engine", move |mut stop| async move {
            tracing::info!(
                address = %self.wallet.address(),
                destination = %self.settings.destination,
                minimum = %self.settings.min_forward_amount(),
                "Forwarding engine starting"
            );
            loop {
                tokio::select! {
                    command = commands.recv() => {
                        let outcome = match command {
                            Some(EngineCommand::BalanceObserved(snapshot)) => {
                                self.on_balance_observed(snapshot).await
                            }
                            Some(EngineCommand::Retry) => self.retry_forwarding().await,
                            None => break,
                        };
                        if outcome.went_in_flight() {
                            self.discard_in_flight(&mut commands);
                        }
                    }
                    _ = stop.recv() => break,
                }
            }
            tracing::info!("Forwarding engine stopped");
        })
    }
}
