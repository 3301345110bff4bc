//! Storage error types

use strata_data::DataError;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// RocksDB error
    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Invalid column family
    #[error("invalid column family: {0}")]
    InvalidColumnFamily(String),

    /// Database not open
    #[error("database not open")]
    NotOpen,

    /// Database already open
    #[error("database already open")]
    AlreadyOpen,

    /// Invalid data format
    #[error("invalid data format: {0}")]
    InvalidFormat(String),
}

impl From<StorageError> for DataError {
    fn from(err: StorageError) -> Self {
        DataError::Store(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
