//! Status oracle: the contract that reports phase, rates and balances.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use serde::Serialize;

use crate::blockchain::{BlockchainError, BlockchainResult, NodeEndpoint};

sol! {
    /// Positional status tuple. Field order is part of the wire contract.
    function getStatus(uint8 phase, address ethAddress, string btcAddress)
        external
        view
        returns (
            uint8 currentState,
            uint256 fxRate,
            uint256 currentMultiplier,
            uint256 donationCount,
            uint256 totalTokenAmount,
            uint256 startTime,
            uint256 endTime,
            bool isCapReached,
            uint256 chfCentsDonated,
            uint256 tokenBalance,
            uint256 fwdBalance,
            uint256 donated
        );
}

/// Decoded status tuple, fields in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub current_state: u8,
    pub fx_rate: U256,
    pub current_multiplier: U256,
    pub donation_count: U256,
    pub total_token_amount: U256,
    pub start_time: U256,
    pub end_time: U256,
    pub is_cap_reached: bool,
    pub chf_cents_donated: U256,
    pub token_balance: U256,
    /// Balance of the forwarding wallet; drives forwarding decisions.
    pub fwd_balance: U256,
    pub donated: U256,
}

impl From<getStatusReturn> for StatusSnapshot {
    fn from(r: getStatusReturn) -> Self {
        Self {
            current_state: r.currentState,
            fx_rate: r.fxRate,
            current_multiplier: r.currentMultiplier,
            donation_count: r.donationCount,
            total_token_amount: r.totalTokenAmount,
            start_time: r.startTime,
            end_time: r.endTime,
            is_cap_reached: r.isCapReached,
            chf_cents_donated: r.chfCentsDonated,
            token_balance: r.tokenBalance,
            fwd_balance: r.fwdBalance,
            donated: r.donated,
        }
    }
}

/// Source of status snapshots.
#[async_trait]
pub trait StatusOracle: Send + Sync {
    async fn query_status(
        &self,
        phase: u8,
        eth_address: Address,
        btc_address: &str,
    ) -> BlockchainResult<StatusSnapshot>;
}

/// Calldata for a status query.
pub fn status_calldata(phase: u8, eth_address: Address, btc_address: &str) -> Bytes {
    Bytes::from(
        getStatusCall {
            phase,
            ethAddress: eth_address,
            btcAddress: btc_address.to_string(),
        }
        .abi_encode(),
    )
}

/// Decode the positional return tuple.
pub fn decode_status(data: &[u8]) -> BlockchainResult<StatusSnapshot> {
    getStatusCall::abi_decode_returns(data)
        .map(StatusSnapshot::from)
        .map_err(|e| BlockchainError::Decode(format!("status tuple: {}", e)))
}

/// Oracle backed by an on-chain contract read through the current node.
#[derive(Debug, Clone)]
pub struct ContractStatusOracle {
    endpoint: NodeEndpoint,
    contract: Address,
}

impl ContractStatusOracle {
    pub fn new(endpoint: NodeEndpoint, contract: Address) -> Self {
        Self { endpoint, contract }
    }
}

#[async_trait]
impl StatusOracle for ContractStatusOracle {
    async fn query_status(
        &self,
        phase: u8,
        eth_address: Address,
        btc_address: &str,
    ) -> BlockchainResult<StatusSnapshot> {
        let data = status_calldata(phase, eth_address, btc_address);
        let output = self.endpoint.rpc().call(self.contract, data).await?;
        decode_status(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::{sol_data, SolType};

    #[test]
    fn test_decode_preserves_field_order() {
        let tuple = (
            2u8,
            U256::from(11u64),
            U256::from(12u64),
            U256::from(13u64),
            U256::from(14u64),
            U256::from(15u64),
            U256::from(16u64),
            true,
            U256::from(17u64),
            U256::from(18u64),
            U256::from(19u64),
            U256::from(20u64),
        );
        type StatusTuple = (
            sol_data::Uint<8>,
            sol_data::Uint<256>,
            sol_data::Uint<256>,
            sol_data::Uint<256>,
            sol_data::Uint<256>,
            sol_data::Uint<256>,
            sol_data::Uint<256>,
            sol_data::Bool,
            sol_data::Uint<256>,
            sol_data::Uint<256>,
            sol_data::Uint<256>,
            sol_data::Uint<256>,
        );
        let encoded = StatusTuple::abi_encode_params(&tuple);

        let snapshot = decode_status(&encoded).unwrap();
        assert_eq!(snapshot.current_state, 2);
        assert_eq!(snapshot.fx_rate, U256::from(11u64));
        assert!(snapshot.is_cap_reached);
        assert_eq!(snapshot.token_balance, U256::from(18u64));
        assert_eq!(snapshot.fwd_balance, U256::from(19u64));
        assert_eq!(snapshot.donated, U256::from(20u64));
    }

    #[test]
    fn test_decode_rejects_short_data() {
        assert!(decode_status(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_calldata_selector() {
        let data = status_calldata(1, Address::ZERO, "bc1qexample");
        assert_eq!(
            &data[..4],
            &alloy::primitives::keccak256("getStatus(uint8,address,string)")[..4]
        );
    }
}
