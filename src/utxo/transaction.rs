//! UTXO sweep transactions: fee arithmetic, building and P2WPKH signing.
//!
//! A sweep spends every output of the watched address. The dry run used for
//! fee estimation pays zero to the destination and everything back to the
//! source as change; the real transaction pays `total - fee` to the
//! destination. Both carry the `OP_RETURN` linking payload.

use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::script::PushBytesBuf;
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, CompressedPublicKey, Network, OutPoint, PrivateKey, ScriptBuf, Sequence,
    Transaction, TxIn, TxOut, Witness,
};

use crate::utxo::types::{Utxo, UtxoError};

/// Environment variable holding the WIF-encoded key of the watched address.
pub const BTC_PRIVATE_KEY_ENV: &str = "FORWARDER_BTC_PRIVATE_KEY";

/// Scale an estimated fee by the safety multiplier, rounding up.
pub fn apply_safety_multiplier(base_fee: u64, multiplier: f64) -> u64 {
    (base_fee as f64 * multiplier).ceil() as u64
}

/// Sum of the outputs' values; an overflowing set is a malformed explorer answer.
pub fn total_value(utxos: &[Utxo]) -> Result<u64, UtxoError> {
    utxos.iter().try_fold(0u64, |total, utxo| {
        total.checked_add(utxo.satoshi_value).ok_or_else(|| {
            UtxoError::Explorer(format!(
                "unspent outputs overflow at {}:{}",
                utxo.txid, utxo.output_index
            ))
        })
    })
}

/// Amount left for the destination, or an error if the fee eats it all.
pub fn forward_amount(total: u64, fee: u64) -> Result<u64, UtxoError> {
    match total.checked_sub(fee) {
        Some(amount) if amount > 0 => Ok(amount),
        _ => Err(UtxoError::InsufficientValue { total, fee }),
    }
}

pub fn parse_address(address: &str, network: Network) -> Result<Address, UtxoError> {
    Address::from_str(address)
        .map_err(|e| UtxoError::Address(e.to_string()))?
        .require_network(network)
        .map_err(|e| UtxoError::Address(e.to_string()))
}

fn linking_output(payload: &[u8]) -> Result<TxOut, UtxoError> {
    let data = PushBytesBuf::try_from(payload.to_vec())
        .map_err(|e| UtxoError::Build(e.to_string()))?;
    Ok(TxOut {
        value: Amount::ZERO,
        script_pubkey: ScriptBuf::new_op_return(&data),
    })
}

fn unsigned(utxos: &[Utxo], output: Vec<TxOut>) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: utxos
            .iter()
            .map(|utxo| TxIn {
                previous_output: OutPoint::new(utxo.txid, utxo.output_index),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::default(),
            })
            .collect(),
        output,
    }
}

/// Transaction with the sweep's shape, used only to size the fee.
pub fn build_dry_run(
    utxos: &[Utxo],
    destination: &Address,
    change: &Address,
    payload: &[u8],
) -> Result<Transaction, UtxoError> {
    let total = total_value(utxos)?;
    Ok(unsigned(
        utxos,
        vec![
            TxOut {
                value: Amount::ZERO,
                script_pubkey: destination.script_pubkey(),
            },
            TxOut {
                value: Amount::from_sat(total),
                script_pubkey: change.script_pubkey(),
            },
            linking_output(payload)?,
        ],
    ))
}

/// The transaction actually broadcast: everything but the fee to `destination`.
pub fn build_sweep(
    utxos: &[Utxo],
    destination: &Address,
    amount: u64,
    payload: &[u8],
) -> Result<Transaction, UtxoError> {
    if utxos.is_empty() {
        return Err(UtxoError::Build("no inputs".to_string()));
    }
    Ok(unsigned(
        utxos,
        vec![
            TxOut {
                value: Amount::from_sat(amount),
                script_pubkey: destination.script_pubkey(),
            },
            linking_output(payload)?,
        ],
    ))
}

/// Single-key P2WPKH signer for the watched address.
pub struct UtxoSigner {
    secp: Secp256k1<All>,
    private_key: PrivateKey,
    public_key: CompressedPublicKey,
    address: Address,
}

impl UtxoSigner {
    pub fn from_wif(wif: &str, network: Network) -> Result<Self, UtxoError> {
        let private_key = PrivateKey::from_wif(wif.trim())
            .map_err(|e| UtxoError::Key(format!("invalid WIF key: {}", e)))?;
        let secp = Secp256k1::new();
        let public_key = CompressedPublicKey::from_private_key(&secp, &private_key)
            .map_err(|e| UtxoError::Key(e.to_string()))?;
        let address = Address::p2wpkh(&public_key, network);

        tracing::info!(address = %address, "UTXO signer loaded");

        Ok(Self {
            secp,
            private_key,
            public_key,
            address,
        })
    }

    /// Load the key from `FORWARDER_BTC_PRIVATE_KEY`.
    pub fn from_env(network: Network) -> Result<Self, UtxoError> {
        let wif = std::env::var(BTC_PRIVATE_KEY_ENV).map_err(|_| {
            UtxoError::Key(format!("environment variable {} not set", BTC_PRIVATE_KEY_ENV))
        })?;
        Self::from_wif(&wif, network)
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Sign every input of `tx`; `spent[i]` must be the output input `i` spends.
    pub fn sign(&self, tx: &mut Transaction, spent: &[Utxo]) -> Result<(), UtxoError> {
        if tx.input.len() != spent.len() {
            return Err(UtxoError::Build(format!(
                "{} inputs but {} spent outputs",
                tx.input.len(),
                spent.len()
            )));
        }

        let script_pubkey = self.address.script_pubkey();
        let mut witnesses = Vec::with_capacity(spent.len());
        {
            let mut cache = SighashCache::new(&*tx);
            for (index, utxo) in spent.iter().enumerate() {
                let sighash = cache
                    .p2wpkh_signature_hash(
                        index,
                        &script_pubkey,
                        Amount::from_sat(utxo.satoshi_value),
                        EcdsaSighashType::All,
                    )
                    .map_err(|e| UtxoError::Build(e.to_string()))?;
                let msg = Message::from_digest(sighash.to_byte_array());
                let signature = self.secp.sign_ecdsa(&msg, &self.private_key.inner);

                let mut sig_bytes = signature.serialize_der().to_vec();
                sig_bytes.push(EcdsaSighashType::All.to_u32() as u8);

                let mut witness = Witness::new();
                witness.push(&sig_bytes);
                witness.push(self.public_key.0.serialize());
                witnesses.push(witness);
            }
        }

        for (input, witness) in tx.input.iter_mut().zip(witnesses) {
            input.witness = witness;
        }
        Ok(())
    }
}

impl std::fmt::Debug for UtxoSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UtxoSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::opcodes::all::OP_RETURN;

    fn test_wif() -> String {
        PrivateKey::from_slice(&[0x11; 32], Network::Regtest)
            .unwrap()
            .to_wif()
    }

    fn utxo(byte: u8, value: u64) -> Utxo {
        Utxo {
            txid: bitcoin::Txid::from_byte_array([byte; 32]),
            output_index: 0,
            satoshi_value: value,
        }
    }

    fn signer() -> UtxoSigner {
        UtxoSigner::from_wif(&test_wif(), Network::Regtest).unwrap()
    }

    #[test]
    fn test_multiplier_rounds_up() {
        assert_eq!(apply_safety_multiplier(2000, 1.5), 3000);
        assert_eq!(apply_safety_multiplier(1001, 1.5), 1502);
        assert_eq!(apply_safety_multiplier(2000, 1.0), 2000);
    }

    #[test]
    fn test_total_value_rejects_overflow() {
        let mut set = vec![utxo(0, 30_000), utxo(1, 20_000)];
        assert_eq!(total_value(&set).unwrap(), 50_000);

        set.push(utxo(2, u64::MAX));
        assert!(matches!(total_value(&set), Err(UtxoError::Explorer(_))));

        let s = signer();
        let payload = [0u8; 24];
        assert!(build_dry_run(&set, s.address(), s.address(), &payload).is_err());
    }

    #[test]
    fn test_forward_amount_must_be_positive() {
        assert_eq!(forward_amount(50_000, 3_000).unwrap(), 47_000);
        assert!(matches!(
            forward_amount(3_000, 3_000),
            Err(UtxoError::InsufficientValue { total: 3_000, fee: 3_000 })
        ));
        assert!(forward_amount(1_000, 3_000).is_err());
    }

    #[test]
    fn test_sweep_shape() {
        let s = signer();
        let utxos = [utxo(1, 30_000), utxo(2, 20_000)];
        let payload = [7u8; 24];

        let tx = build_sweep(&utxos, s.address(), 47_000, &payload).unwrap();
        assert_eq!(tx.input.len(), 2);
        assert_eq!(tx.output.len(), 2);
        assert_eq!(tx.output[0].value, Amount::from_sat(47_000));
        assert!(tx.output[1].script_pubkey.is_op_return());
        assert_eq!(tx.output[1].script_pubkey.as_bytes()[0], OP_RETURN.to_u8());

        let dry = build_dry_run(&utxos, s.address(), s.address(), &payload).unwrap();
        assert_eq!(dry.output.len(), 3);
        assert_eq!(dry.output[0].value, Amount::ZERO);
        assert_eq!(dry.output[1].value, Amount::from_sat(50_000));
    }

    #[test]
    fn test_sign_fills_every_witness() {
        let s = signer();
        let utxos = [utxo(1, 30_000), utxo(2, 20_000)];
        let mut tx = build_sweep(&utxos, s.address(), 47_000, &[1, 2, 3]).unwrap();

        s.sign(&mut tx, &utxos).unwrap();
        for input in &tx.input {
            assert_eq!(input.witness.len(), 2);
            assert_eq!(input.witness.nth(1).map(|pk| pk.len()), Some(33));
        }

        assert!(s.sign(&mut tx, &utxos[..1]).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", signer());
        assert!(!debug.contains(&test_wif()));
        assert!(debug.contains("address"));
    }

    #[test]
    fn test_bad_wif_rejected() {
        assert!(matches!(
            UtxoSigner::from_wif("nope", Network::Regtest),
            Err(UtxoError::Key(_))
        ));
    }
}
