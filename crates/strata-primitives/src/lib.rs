//! # strata-primitives
//!
//! Primitive types for the Strata ledger.
//!
//! Addresses and hashes are fixed-width byte strings. Both order
//! lexicographically by their bytes, which is the order used by every
//! blob-keyed map in the ledger state.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod error;
mod hash;

pub use address::{Address, AddressError};
pub use error::PrimitiveError;
pub use hash::{Hash, HashError, H256};

/// Coin amount (balances, stakes, fees)
pub type Amount = u64;

/// Account sequence number
pub type Sequence = u64;

/// Block and state timestamp in milliseconds
pub type Timestamp = u64;

/// Metered execution cost
pub type Juice = u64;
