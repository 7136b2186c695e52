//! Explorer access for the UTXO chain.
//!
//! The worker only needs three calls; [`EsploraClient`] provides them over
//! an Esplora-compatible REST API.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::{Address, Transaction, Txid};

use crate::utxo::types::{Utxo, UtxoError};

/// Witness weight of one P2WPKH input: item count, DER signature with
/// sighash byte (max 72) and compressed pubkey, each length-prefixed.
const P2WPKH_WITNESS_WEIGHT: u64 = 1 + 1 + 72 + 1 + 33;

/// Segwit marker and flag bytes.
const SEGWIT_OVERHEAD_WEIGHT: u64 = 2;

#[async_trait]
pub trait UtxoExplorer: Send + Sync {
    async fn unspent_outputs(&self, address: &Address) -> Result<Vec<Utxo>, UtxoError>;

    /// Estimated fee in satoshis for `tx` once its inputs are signed.
    async fn estimate_fee(&self, tx: &Transaction) -> Result<u64, UtxoError>;

    async fn broadcast(&self, tx: &Transaction) -> Result<Txid, UtxoError>;
}

/// Virtual size of `tx` after every input gets a P2WPKH witness.
pub fn estimated_vsize(tx: &Transaction) -> u64 {
    let mut weight = tx.weight().to_wu();
    let unsigned = tx.input.iter().all(|input| input.witness.is_empty());
    if unsigned && !tx.input.is_empty() {
        weight += SEGWIT_OVERHEAD_WEIGHT + P2WPKH_WITNESS_WEIGHT * tx.input.len() as u64;
    }
    weight.div_ceil(4)
}

/// Pick the fee rate (sat/vB) for a confirmation target.
///
/// Uses the largest target not above `target`; falls back to the slowest
/// rate the explorer knows when every target is above it.
pub fn pick_fee_rate(estimates: &HashMap<String, f64>, target: u16) -> Option<f64> {
    let mut parsed: Vec<(u16, f64)> = estimates
        .iter()
        .filter_map(|(k, v)| k.parse::<u16>().ok().map(|t| (t, *v)))
        .collect();
    parsed.sort_by_key(|(t, _)| *t);

    parsed
        .iter()
        .rev()
        .find(|(t, _)| *t <= target)
        .or_else(|| parsed.first())
        .map(|(_, rate)| *rate)
}

pub fn fee_for_rate(rate: f64, vsize: u64) -> u64 {
    (rate * vsize as f64).ceil() as u64
}

/// Esplora REST client (`/address/{a}/utxo`, `/fee-estimates`, `/tx`).
#[derive(Debug, Clone)]
pub struct EsploraClient {
    http: reqwest::Client,
    base_url: String,
    target_blocks: u16,
}

impl EsploraClient {
    pub fn new(base_url: &str, target_blocks: u16, timeout: Duration) -> Result<Self, UtxoError> {
        url::Url::parse(base_url).map_err(|e| UtxoError::Explorer(e.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UtxoError::Explorer(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            target_blocks,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

fn transport(e: reqwest::Error) -> UtxoError {
    UtxoError::Explorer(e.to_string())
}

#[async_trait]
impl UtxoExplorer for EsploraClient {
    async fn unspent_outputs(&self, address: &Address) -> Result<Vec<Utxo>, UtxoError> {
        self.http
            .get(self.url(&format!("address/{}/utxo", address)))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(transport)?
            .json::<Vec<Utxo>>()
            .await
            .map_err(transport)
    }

    async fn estimate_fee(&self, tx: &Transaction) -> Result<u64, UtxoError> {
        let estimates: HashMap<String, f64> = self
            .http
            .get(self.url("fee-estimates"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;

        let rate = pick_fee_rate(&estimates, self.target_blocks)
            .ok_or_else(|| UtxoError::Explorer("empty fee estimates".to_string()))?;
        let vsize = estimated_vsize(tx);
        tracing::debug!(rate, vsize, target = self.target_blocks, "Fee estimate");
        Ok(fee_for_rate(rate, vsize))
    }

    async fn broadcast(&self, tx: &Transaction) -> Result<Txid, UtxoError> {
        let response = self
            .http
            .post(self.url("tx"))
            .header("Content-Type", "text/plain")
            .body(serialize_hex(tx))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(UtxoError::Rejected(format!("{}: {}", status, body.trim())));
        }
        Txid::from_str(body.trim()).map_err(|e| UtxoError::Explorer(e.to_string()))
    }
}
