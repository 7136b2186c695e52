//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the forwarder.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the donation forwarder.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Account-chain node endpoint settings.
    pub node: NodeConfig,

    /// Account-chain forwarding rules.
    pub forwarding: ForwardingConfig,

    /// External status oracle polling.
    pub status: StatusConfig,

    /// UTXO-chain forwarding worker.
    pub bitcoin: BitcoinConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Account-chain JSON-RPC endpoint configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Connectivity ping interval in milliseconds.
    pub ping_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 1,
            rpc_timeout_secs: 10,
            ping_interval_ms: 5_000,
        }
    }
}

/// Account-chain forwarding configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Enable account-chain forwarding.
    pub enabled: bool,

    /// Receiving contract the balance is forwarded to.
    pub destination: String,

    /// Identity credited for the forwarded value.
    pub identity: String,

    /// Append a 4-byte keccak checksum of the identity to the payload.
    pub include_checksum: bool,

    /// Gas price used for every forward, in gwei.
    pub gas_price_gwei: u64,

    /// Gas limit (max gas per forward).
    pub gas_limit: u64,

    /// Smallest donation worth forwarding, in gwei.
    pub min_donation_gwei: u64,

    /// Receipt polling interval in milliseconds.
    pub confirmation_poll_ms: u64,

    /// Give up waiting for a receipt after this many seconds.
    pub confirmation_timeout_secs: u64,

    /// Delay between pending-count queries when the node is unreachable.
    pub nonce_retry_ms: u64,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            destination: String::new(),
            identity: String::new(),
            include_checksum: true,
            gas_price_gwei: 20,
            gas_limit: 200_000,
            min_donation_gwei: 1_000_000_000, // 1 ether
            confirmation_poll_ms: 2_000,
            confirmation_timeout_secs: 600,
            nonce_retry_ms: 1_000,
        }
    }
}

/// Status oracle configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Enable status polling.
    pub enabled: bool,

    /// Address of the status contract.
    pub oracle_address: String,

    /// Phase argument passed to every status query.
    pub phase: u8,

    /// Watched UTXO-chain address passed to the oracle.
    pub btc_address: String,

    /// Polling interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            oracle_address: String::new(),
            phase: 0,
            btc_address: String::new(),
            poll_interval_ms: 10_000,
        }
    }
}

/// UTXO-chain forwarding worker configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BitcoinConfig {
    /// Enable the UTXO forwarding worker.
    pub enabled: bool,

    /// Network name: bitcoin, testnet, signet or regtest.
    pub network: String,

    /// Esplora-compatible explorer base URL.
    pub explorer_url: String,

    /// Destination address for forwarded outputs.
    pub destination: String,

    /// Identity embedded in the linking payload.
    pub identity: String,

    /// Polling interval in seconds.
    pub poll_interval_secs: u64,

    /// Multiplier applied to the explorer's fee estimate (>= 1.0).
    pub fee_safety_multiplier: f64,

    /// Confirmation target (blocks) used to pick the fee rate.
    pub fee_target_blocks: u16,

    /// Explorer request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for BitcoinConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            network: "bitcoin".to_string(),
            explorer_url: "https://blockstream.info/api".to_string(),
            destination: String::new(),
            identity: String::new(),
            poll_interval_secs: 60,
            fee_safety_multiplier: 1.5,
            fee_target_blocks: 6,
            request_timeout_secs: 15,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
