//! Scripted in-memory collaborators shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use alloy::consensus::{TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{CompressedPublicKey, Network, PrivateKey, Transaction, Txid};
use tokio::sync::Notify;

use donation_forwarder::blockchain::{
    BlockchainError, BlockchainResult, NodeEndpoint, NodeRpc, TxReceipt, Wallet,
};
use donation_forwarder::forwarding::ForwardingSettings;
use donation_forwarder::health::{ConnectionListener, ConnectivityHandle, ListenerError};
use donation_forwarder::status::{StatusOracle, StatusSnapshot};
use donation_forwarder::utxo::{Utxo, UtxoError, UtxoExplorer};

pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn eth(whole: u64) -> U256 {
    U256::from(whole) * U256::from(1_000_000_000_000_000_000u64)
}

pub fn milli_eth(milli: u64) -> U256 {
    U256::from(milli) * U256::from(1_000_000_000_000_000u64)
}

pub fn wallet() -> Wallet {
    Wallet::from_private_key(TEST_PRIVATE_KEY, 1).unwrap()
}

/// 20 gwei × 200 000 gas reserve, 1 ETH minimum donation, fast polling.
pub fn settings() -> ForwardingSettings {
    ForwardingSettings {
        destination: Address::repeat_byte(0xaa),
        identity: Address::repeat_byte(0xbb),
        include_checksum: true,
        gas_price: 20_000_000_000,
        gas_limit: 200_000,
        min_donation: eth(1),
        confirmation_poll: Duration::from_millis(1),
        confirmation_timeout: Duration::from_millis(20),
        nonce_retry: Duration::from_millis(1),
    }
}

pub fn decode_legacy(raw: &Bytes) -> TxLegacy {
    let mut buf: &[u8] = &raw[..];
    match TxEnvelope::decode_2718(&mut buf).unwrap() {
        TxEnvelope::Legacy(signed) => signed.tx().clone(),
        _ => panic!("expected a legacy transaction"),
    }
}

/// How the mock node answers receipt queries.
#[derive(Debug, Clone, Copy)]
pub enum ReceiptMode {
    Mined { gas_used: u64, status: Option<bool> },
    Pending,
    Unreachable,
}

/// Scripted account-chain node.
pub struct MockNode {
    ping_ok: AtomicBool,
    hold_pings: AtomicBool,
    release_pings: Notify,
    pings: AtomicU64,
    pending_script: Mutex<VecDeque<Result<u64, String>>>,
    pending_default: AtomicU64,
    broadcast_error: Mutex<Option<String>>,
    sent: Mutex<Vec<Bytes>>,
    receipts: Mutex<ReceiptMode>,
}

impl MockNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ping_ok: AtomicBool::new(true),
            hold_pings: AtomicBool::new(false),
            release_pings: Notify::new(),
            pings: AtomicU64::new(0),
            pending_script: Mutex::new(VecDeque::new()),
            pending_default: AtomicU64::new(0),
            broadcast_error: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            receipts: Mutex::new(ReceiptMode::Mined {
                gas_used: 60_000,
                status: Some(true),
            }),
        })
    }

    pub fn set_ping_ok(&self, ok: bool) {
        self.ping_ok.store(ok, Ordering::SeqCst);
    }

    /// Make pings wait until [`MockNode::release_ping`].
    pub fn hold_pings(&self, hold: bool) {
        self.hold_pings.store(hold, Ordering::SeqCst);
    }

    pub fn release_ping(&self) {
        self.release_pings.notify_one();
    }

    pub fn ping_count(&self) -> u64 {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn set_pending_count(&self, count: u64) {
        self.pending_default.store(count, Ordering::SeqCst);
    }

    /// Answers consumed before falling back to the default pending count.
    pub fn script_pending(&self, answers: impl IntoIterator<Item = Result<u64, String>>) {
        self.pending_script.lock().unwrap().extend(answers);
    }

    pub fn fail_broadcasts(&self, reason: Option<&str>) {
        *self.broadcast_error.lock().unwrap() = reason.map(str::to_string);
    }

    pub fn set_receipts(&self, mode: ReceiptMode) {
        *self.receipts.lock().unwrap() = mode;
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_transactions(&self) -> Vec<TxLegacy> {
        self.sent().iter().map(decode_legacy).collect()
    }
}

#[async_trait]
impl NodeRpc for MockNode {
    async fn ping(&self) -> BlockchainResult<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.hold_pings.load(Ordering::SeqCst) {
            self.release_pings.notified().await;
        }
        if self.ping_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BlockchainError::Rpc("connection refused".into()))
        }
    }

    async fn pending_transaction_count(&self, _address: Address) -> BlockchainResult<u64> {
        match self.pending_script.lock().unwrap().pop_front() {
            Some(Ok(count)) => Ok(count),
            Some(Err(e)) => Err(BlockchainError::Rpc(e)),
            None => Ok(self.pending_default.load(Ordering::SeqCst)),
        }
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> BlockchainResult<TxHash> {
        if let Some(reason) = self.broadcast_error.lock().unwrap().clone() {
            return Err(BlockchainError::Rpc(reason));
        }
        self.sent.lock().unwrap().push(Bytes::copy_from_slice(raw));
        Ok(keccak256(raw))
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<TxReceipt>> {
        match *self.receipts.lock().unwrap() {
            ReceiptMode::Mined { gas_used, status } => Ok(Some(TxReceipt {
                tx_hash,
                block_number: Some(1),
                gas_used,
                status,
            })),
            ReceiptMode::Pending => Ok(None),
            ReceiptMode::Unreachable => Err(BlockchainError::Rpc("connection reset".into())),
        }
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        Ok(1)
    }

    async fn call(&self, _to: Address, _data: Bytes) -> BlockchainResult<Bytes> {
        Err(BlockchainError::Rpc("calls not scripted".into()))
    }
}

pub fn endpoint(node: &Arc<MockNode>) -> NodeEndpoint {
    NodeEndpoint::new(node.clone())
}

/// Records every connectivity edge, and the connected flag seen at the time.
#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<(String, Option<bool>)>>,
    pub fail: AtomicBool,
    pub panic: AtomicBool,
    pub handle: OnceLock<ConnectivityHandle>,
}

impl RecordingListener {
    fn record(&self, event: String) -> Result<(), ListenerError> {
        let seen = self.handle.get().map(ConnectivityHandle::is_connected);
        self.events.lock().unwrap().push((event, seen));
        if self.panic.load(Ordering::SeqCst) {
            panic!("listener blew up");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err("listener exploded".into());
        }
        Ok(())
    }

    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(e, _)| e.clone())
            .collect()
    }
}

impl ConnectionListener for RecordingListener {
    fn on_connected(&self) -> Result<(), ListenerError> {
        self.record("connected".into())
    }

    fn on_disconnected(&self, reason: &str) -> Result<(), ListenerError> {
        self.record(format!("disconnected: {}", reason))
    }
}

/// Status oracle answering from a queue, then repeating the last answer.
pub struct MockOracle {
    answers: Mutex<VecDeque<Result<StatusSnapshot, String>>>,
}

impl MockOracle {
    pub fn new(answers: impl IntoIterator<Item = Result<StatusSnapshot, String>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into_iter().collect()),
        })
    }
}

pub fn snapshot_with_balance(balance: U256) -> StatusSnapshot {
    StatusSnapshot {
        fwd_balance: balance,
        ..StatusSnapshot::default()
    }
}

#[async_trait]
impl StatusOracle for MockOracle {
    async fn query_status(
        &self,
        _phase: u8,
        _eth_address: Address,
        _btc_address: &str,
    ) -> BlockchainResult<StatusSnapshot> {
        let mut answers = self.answers.lock().unwrap();
        let next = if answers.len() > 1 {
            answers.pop_front()
        } else {
            answers.front().cloned()
        };
        match next {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(e)) => Err(BlockchainError::Rpc(e)),
            None => Err(BlockchainError::Rpc("no status scripted".into())),
        }
    }
}

/// Scripted Esplora stand-in.
pub struct MockExplorer {
    pub utxos: Mutex<Vec<Utxo>>,
    pub base_fee: AtomicU64,
    pub unreachable: AtomicBool,
    pub reject: Mutex<Option<String>>,
    pub estimated: Mutex<Vec<Transaction>>,
    pub broadcasts: Mutex<Vec<Transaction>>,
}

impl MockExplorer {
    pub fn new(values: &[u64], base_fee: u64) -> Arc<Self> {
        Arc::new(Self {
            utxos: Mutex::new(utxos(values)),
            base_fee: AtomicU64::new(base_fee),
            unreachable: AtomicBool::new(false),
            reject: Mutex::new(None),
            estimated: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
        })
    }

    fn reachable(&self) -> Result<(), UtxoError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(UtxoError::Explorer("connection refused".into()));
        }
        Ok(())
    }

    pub fn broadcasts(&self) -> Vec<Transaction> {
        self.broadcasts.lock().unwrap().clone()
    }
}

pub fn utxos(values: &[u64]) -> Vec<Utxo> {
    use bitcoin::hashes::Hash;

    values
        .iter()
        .enumerate()
        .map(|(i, value)| Utxo {
            txid: Txid::from_byte_array([i as u8 + 1; 32]),
            output_index: i as u32,
            satoshi_value: *value,
        })
        .collect()
}

#[async_trait]
impl UtxoExplorer for MockExplorer {
    async fn unspent_outputs(&self, _address: &bitcoin::Address) -> Result<Vec<Utxo>, UtxoError> {
        self.reachable()?;
        Ok(self.utxos.lock().unwrap().clone())
    }

    async fn estimate_fee(&self, tx: &Transaction) -> Result<u64, UtxoError> {
        self.reachable()?;
        self.estimated.lock().unwrap().push(tx.clone());
        Ok(self.base_fee.load(Ordering::SeqCst))
    }

    async fn broadcast(&self, tx: &Transaction) -> Result<Txid, UtxoError> {
        self.reachable()?;
        if let Some(reason) = self.reject.lock().unwrap().clone() {
            return Err(UtxoError::Rejected(reason));
        }
        self.broadcasts.lock().unwrap().push(tx.clone());
        Ok(tx.compute_txid())
    }
}

/// WIF key and its regtest P2WPKH address, derived from `seed`.
pub fn regtest_key(seed: u8) -> (String, bitcoin::Address) {
    let key = PrivateKey::from_slice(&[seed; 32], Network::Regtest).unwrap();
    let pk = CompressedPublicKey::from_private_key(&Secp256k1::new(), &key).unwrap();
    (key.to_wif(), bitcoin::Address::p2wpkh(&pk, Network::Regtest))
}
