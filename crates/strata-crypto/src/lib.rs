//! # strata-crypto
//!
//! Cryptographic primitives for the Strata ledger.
//!
//! - SHA3-256 content hashing of cell encodings
//! - Keccak-256 for address derivation
//! - ECDSA signing and signer recovery (secp256k1)

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod signature;

pub use error::CryptoError;
pub use hash::{keccak256, sha3_256};
pub use signature::{
    public_key_to_address, recover_address, recover_public_key, sign, verify, KeyPair,
    PrivateKey, PublicKey, Signature,
};
