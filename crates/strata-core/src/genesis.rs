//! Genesis state construction

use crate::config::LedgerConfig;
use crate::error::{CoreError, CoreResult};
use crate::BlockApplier;
use strata_data::Store;
use strata_primitives::Address;
use strata_state::State;
use strata_types::{AccountStatus, PeerStatus, MAX_AMOUNT};

/// Builds the initial ledger state from a [`LedgerConfig`]
pub struct GenesisBuilder {
    config: LedgerConfig,
}

impl GenesisBuilder {
    /// Create a new genesis builder
    pub fn new(config: LedgerConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Applier matching the configuration
    pub fn applier(&self) -> BlockApplier {
        BlockApplier::new().with_memory_allowance(self.config.default_memory_allowance)
    }

    /// Build the genesis state.
    ///
    /// Fails on malformed addresses or when balances and stakes together
    /// exceed [`MAX_AMOUNT`].
    pub fn build(&self, store: &dyn Store) -> CoreResult<State> {
        self.config.validate()?;
        tracing::info!("Building genesis state...");

        let mut supply: u128 = 0;
        let mut state = State::new(self.config.initial_timestamp, self.config.juice_price)?;

        for (addr_str, balance) in &self.config.accounts {
            let address = parse_address(addr_str)?;
            supply += *balance as u128;
            let account = AccountStatus::new(*balance, self.config.default_memory_allowance);
            state = state.with_account(&address, &account, store)?;
            tracing::debug!(address = %address, balance, "genesis account");
        }

        for (addr_str, peer) in &self.config.peers {
            let address = parse_address(addr_str)?;
            supply += peer.stake as u128;
            let mut status = PeerStatus::new(peer.stake);
            if let Some(url) = &peer.url {
                status = status.with_host(url.as_str());
            }
            state = state.with_peer(&address, &status, store)?;
            tracing::debug!(address = %address, stake = peer.stake, "genesis peer");
        }

        if supply > MAX_AMOUNT as u128 {
            return Err(CoreError::Genesis(format!(
                "total supply {} exceeds maximum {}",
                supply, MAX_AMOUNT
            )));
        }

        tracing::info!(
            accounts = state.account_count(),
            supply = supply as u64,
            hash = %state.hash(),
            "Genesis state built"
        );
        Ok(state)
    }
}

fn parse_address(s: &str) -> CoreResult<Address> {
    Address::from_hex(s.trim()).map_err(|e| CoreError::Genesis(format!("invalid address {}: {}", s, e)))
}
