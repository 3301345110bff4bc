//! Data model error types

use strata_primitives::Hash;
use thiserror::Error;

/// Errors raised while encoding, decoding or loading cells
#[derive(Debug, Error)]
pub enum DataError {
    /// Malformed or non-canonical encoding
    #[error("bad format: {0}")]
    BadFormat(String),

    /// Referenced cell is not present in the store
    #[error("missing data: {0}")]
    MissingData(Hash),

    /// Stored bytes do not hash to the hash they were requested by
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Requested hash
        expected: Hash,
        /// Hash of the returned bytes
        actual: Hash,
    },

    /// Failure reported by the backing store
    #[error("store error: {0}")]
    Store(String),

    /// Index past the end of a vector
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: u64,
        /// Vector length
        len: u64,
    },

    /// Cell has a different type from the one expected
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected type name
        expected: &'static str,
        /// Actual type name
        found: &'static str,
    },

    /// Map key longer than an embeddable blob
    #[error("map key too long: {0} bytes")]
    KeyTooLong(usize),
}

impl DataError {
    /// Shorthand for [`DataError::BadFormat`]
    pub fn bad_format(msg: impl Into<String>) -> Self {
        DataError::BadFormat(msg.into())
    }
}

/// Result type for data operations
pub type DataResult<T> = Result<T, DataError>;
