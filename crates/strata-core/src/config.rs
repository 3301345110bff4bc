//! Ledger configuration

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use strata_types::MAX_AMOUNT;

/// Genesis peer entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Peer's own stake
    #[serde(default)]
    pub stake: u64,
    /// Advertised host or URL
    #[serde(default)]
    pub url: Option<String>,
}

/// Parameters of a new ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Coins charged per unit of juice
    #[serde(default = "default_juice_price")]
    pub juice_price: u64,
    /// Genesis timestamp in milliseconds
    #[serde(default)]
    pub initial_timestamp: u64,
    /// Memory allowance of genesis accounts and accounts created by transfers
    #[serde(default)]
    pub default_memory_allowance: u64,
    /// Initial balances, hex address to amount
    #[serde(default)]
    pub accounts: BTreeMap<String, u64>,
    /// Initial peers, hex address to stake and URL
    #[serde(default)]
    pub peers: BTreeMap<String, PeerConfig>,
}

fn default_juice_price() -> u64 {
    1
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            juice_price: default_juice_price(),
            initial_timestamp: 0,
            default_memory_allowance: 0,
            accounts: BTreeMap::new(),
            peers: BTreeMap::new(),
        }
    }
}

impl LedgerConfig {
    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> CoreResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Parse a JSON document
    pub fn from_json_str(s: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Render as pretty JSON
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from a file, choosing the format by extension (`.json`, else TOML)
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents)?,
            _ => Self::from_toml_str(&contents)?,
        };
        tracing::info!(
            path = %path.display(),
            accounts = config.accounts.len(),
            peers = config.peers.len(),
            "ledger config loaded"
        );
        Ok(config)
    }

    /// Add a genesis balance
    pub fn with_account(mut self, address: impl Into<String>, balance: u64) -> Self {
        self.accounts.insert(address.into(), balance);
        self
    }

    /// Add a genesis peer
    pub fn with_peer(mut self, address: impl Into<String>, stake: u64, url: Option<&str>) -> Self {
        self.peers.insert(
            address.into(),
            PeerConfig {
                stake,
                url: url.map(str::to_string),
            },
        );
        self
    }

    /// Reject settings that cannot be stored in a state record
    pub fn validate(&self) -> CoreResult<()> {
        for (name, value) in [
            ("juice_price", self.juice_price),
            ("initial_timestamp", self.initial_timestamp),
            ("default_memory_allowance", self.default_memory_allowance),
        ] {
            if value > MAX_AMOUNT {
                return Err(CoreError::Config(format!("{} out of range: {}", name, value)));
            }
        }
        Ok(())
    }
}
