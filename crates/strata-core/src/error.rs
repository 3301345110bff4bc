//! Core error types

use strata_data::DataError;
use thiserror::Error;

/// Errors outside transaction semantics.
///
/// Transaction failures are recorded as error codes in results; these
/// cover configuration, genesis and the store boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid configuration
    #[error("invalid config: {0}")]
    Config(String),

    /// Invalid genesis allocation
    #[error("invalid genesis: {0}")]
    Genesis(String),

    /// Data model or store error
    #[error("data error: {0}")]
    Data(#[from] DataError),

    /// I/O error while reading configuration
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parse error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
