//! Hash functions

use sha3::{Digest, Keccak256, Sha3_256};
use strata_primitives::H256;

/// SHA3-256 of the input. This is the content hash of every cell.
pub fn sha3_256(data: &[u8]) -> H256 {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    H256::from_bytes(hasher.finalize().into())
}

/// Keccak-256 of the input
pub fn keccak256(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    H256::from_bytes(hasher.finalize().into())
}
