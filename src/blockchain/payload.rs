//! Linking payloads that bind forwarded value to a destination identity.
//!
//! The account-chain payload is a standard ABI call (4-byte selector followed
//! by 32-byte words) understood by the receiving contract. The UTXO-chain
//! payload is the raw identity plus the same checksum, carried in `OP_RETURN`.

use alloy::primitives::{keccak256, Address, Bytes, FixedBytes};
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    /// Credit `addr` with the attached value.
    function donateAs(address addr) external payable;

    /// Same as `donateAs`, rejected by the contract if `checksum` does not match.
    function donateAsWithChecksum(address addr, bytes4 checksum) external payable;
}

/// First four bytes of `keccak256(identity)`.
pub fn identity_checksum(identity: Address) -> FixedBytes<4> {
    let hash = keccak256(identity.as_slice());
    FixedBytes::from_slice(&hash[..4])
}

/// Calldata for an account-chain forward.
pub fn donation_calldata(identity: Address, include_checksum: bool) -> Bytes {
    let encoded = if include_checksum {
        donateAsWithChecksumCall {
            addr: identity,
            checksum: identity_checksum(identity),
        }
        .abi_encode()
    } else {
        donateAsCall { addr: identity }.abi_encode()
    };
    Bytes::from(encoded)
}

/// `OP_RETURN` body for a UTXO-chain forward: identity followed by checksum.
pub fn linking_payload(identity: Address) -> Vec<u8> {
    let mut payload = Vec::with_capacity(24);
    payload.extend_from_slice(identity.as_slice());
    payload.extend_from_slice(identity_checksum(identity).as_slice());
    payload
}
