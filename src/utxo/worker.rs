//! Periodic sweep of the watched UTXO address to the destination.
//!
//! Explorer reachability is tracked here and published as `btc_connected`,
//! independently of the account-chain connectivity monitor.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bitcoin::{Address, Network};

use crate::blockchain::payload::linking_payload;
use crate::config::BitcoinConfig;
use crate::lifecycle::ScheduledTask;
use crate::observability::metrics;
use crate::status::StatusBoard;
use crate::utxo::explorer::{EsploraClient, UtxoExplorer};
use crate::utxo::transaction::{
    apply_safety_multiplier, build_dry_run, build_sweep, forward_amount, parse_address,
    total_value, UtxoSigner,
};
use crate::utxo::types::{SweepOutcome, SweepReceipt, UtxoError};

/// Parsed UTXO forwarding parameters.
#[derive(Debug, Clone)]
pub struct UtxoSettings {
    pub network: Network,
    pub destination: Address,
    /// `identity ‖ checksum`, carried in the `OP_RETURN` output.
    pub payload: Vec<u8>,
    pub fee_safety_multiplier: f64,
    pub poll_interval: Duration,
}

impl UtxoSettings {
    pub fn from_config(config: &BitcoinConfig) -> Result<Self, UtxoError> {
        let network = Network::from_str(&config.network)
            .map_err(|e| UtxoError::Address(format!("unknown network: {}", e)))?;
        let destination = parse_address(&config.destination, network)?;
        let identity = alloy::primitives::Address::from_str(&config.identity)
            .map_err(|e| UtxoError::Address(format!("invalid identity: {}", e)))?;

        Ok(Self {
            network,
            destination,
            payload: linking_payload(identity),
            fee_safety_multiplier: config.fee_safety_multiplier,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        })
    }
}

/// Sweeps every output of the signer's address, forwarding or refunding.
#[derive(Clone)]
pub struct UtxoForwardingWorker {
    explorer: Arc<dyn UtxoExplorer>,
    signer: Arc<UtxoSigner>,
    settings: UtxoSettings,
    board: StatusBoard,
}

impl UtxoForwardingWorker {
    pub fn new(
        explorer: Arc<dyn UtxoExplorer>,
        signer: UtxoSigner,
        settings: UtxoSettings,
        board: StatusBoard,
    ) -> Self {
        Self {
            explorer,
            signer: Arc::new(signer),
            settings,
            board,
        }
    }

    /// Esplora explorer plus the key from `FORWARDER_BTC_PRIVATE_KEY`.
    pub fn from_config(config: &BitcoinConfig, board: StatusBoard) -> Result<Self, UtxoError> {
        let settings = UtxoSettings::from_config(config)?;
        let explorer = EsploraClient::new(
            &config.explorer_url,
            config.fee_target_blocks,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        let signer = UtxoSigner::from_env(settings.network)?;
        Ok(Self::new(Arc::new(explorer), signer, settings, board))
    }

    pub fn settings(&self) -> &UtxoSettings {
        &self.settings
    }

    /// Sweep everything to the configured destination.
    pub async fn forward_all(&self) -> Result<SweepOutcome, UtxoError> {
        let destination = self.settings.destination.clone();
        self.sweep(&destination).await
    }

    /// Sweep everything to an operator-supplied address instead.
    pub async fn refund_all(&self, to: &Address) -> Result<SweepOutcome, UtxoError> {
        tracing::info!(to = %to, "Refunding UTXO balance");
        self.sweep(to).await
    }

    /// Record explorer reachability from the result of one explorer call.
    fn observe<T>(&self, result: Result<T, UtxoError>) -> Result<T, UtxoError> {
        let reachable = !matches!(&result, Err(e) if e.is_connectivity());
        if self.board.snapshot().btc_connected != reachable {
            if reachable {
                tracing::info!("Explorer reachable");
            } else {
                tracing::warn!("Explorer unreachable");
            }
        }
        self.board.set_btc_connected(reachable);
        metrics::record_connectivity("btc", reachable);
        result
    }

    async fn sweep(&self, to: &Address) -> Result<SweepOutcome, UtxoError> {
        let source = self.signer.address();
        let utxos = self.observe(self.explorer.unspent_outputs(source).await)?;
        if utxos.is_empty() {
            tracing::debug!(address = %source, "No unspent outputs");
            return Ok(SweepOutcome::NothingToSweep);
        }
        let total = self.observe(total_value(&utxos))?;

        let dry_run = build_dry_run(&utxos, to, source, &self.settings.payload)?;
        let base_fee = self.observe(self.explorer.estimate_fee(&dry_run).await)?;
        let fee = apply_safety_multiplier(base_fee, self.settings.fee_safety_multiplier);
        metrics::record_utxo_fee(fee);

        let forwarded = forward_amount(total, fee)?;

        let mut tx = build_sweep(&utxos, to, forwarded, &self.settings.payload)?;
        self.signer.sign(&mut tx, &utxos)?;
        let txid = self.observe(self.explorer.broadcast(&tx).await)?;

        tracing::info!(
            txid = %txid,
            inputs = utxos.len(),
            total,
            base_fee,
            fee,
            forwarded,
            to = %to,
            "UTXO sweep broadcast"
        );

        Ok(SweepOutcome::Swept(SweepReceipt {
            txid,
            inputs: utxos.len(),
            total,
            fee,
            forwarded,
        }))
    }

    /// One scheduled cycle: forward, then publish the result.
    pub async fn tick(&self) {
        match self.forward_all().await {
            Ok(SweepOutcome::NothingToSweep) => {}
            Ok(SweepOutcome::Swept(receipt)) => {
                metrics::record_forward_attempt("btc", "forwarded");
                self.board.update(|s| {
                    s.btc_forwarding_error = None;
                    s.last_btc_forward_tx = Some(receipt.txid.to_string());
                });
            }
            Err(e) if e.is_connectivity() => {
                tracing::debug!(error = %e, "UTXO sweep skipped, explorer unreachable");
            }
            Err(e) => {
                tracing::warn!(error = %e, "UTXO sweep failed");
                metrics::record_forward_attempt("btc", "failed");
                let message = e.to_string();
                self.board.update(|s| s.btc_forwarding_error = Some(message));
            }
        }
    }

    /// Run [`tick`](Self::tick) every poll interval until stopped.
    pub fn start(&self) -> ScheduledTask {
        let worker = self.clone();
        tracing::info!(
            address = %self.signer.address(),
            destination = %self.settings.destination,
            interval_secs = self.settings.poll_interval.as_secs(),
            "UTXO forwarding worker starting"
        );
        ScheduledTask::every("utxo-forwarder", self.settings.poll_interval, move || {
            let worker = worker.clone();
            async move { worker.tick().await }
        })
    }
}
