//! Shared fixtures for block application tests

#![allow(dead_code)]

use std::sync::Once;
use strata_core::{BlockApplier, GenesisBuilder, LedgerConfig};
use strata_crypto::KeyPair;
use strata_data::MemoryStore;
use strata_primitives::Address;
use strata_state::State;
use strata_types::{Action, Block, SignedTransaction, Transaction};

static INIT: Once = Once::new();

/// Route tracing output through the test harness
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub struct Ledger {
    pub store: MemoryStore,
    pub applier: BlockApplier,
    pub state: State,
}

impl Ledger {
    /// Genesis with `balances` for the given keys, juice price 1
    pub fn new(start: u64, balances: &[(&KeyPair, u64)]) -> Self {
        init_tracing();
        let store = MemoryStore::new();
        let mut config = LedgerConfig {
            initial_timestamp: start,
            default_memory_allowance: 1_000,
            ..Default::default()
        };
        for (key, balance) in balances {
            config = config.with_account(key.address().to_hex(), *balance);
        }
        let builder = GenesisBuilder::new(config);
        let state = builder.build(&store).unwrap();
        Self {
            store,
            applier: builder.applier(),
            state,
        }
    }

    pub fn balance(&self, address: &Address) -> u64 {
        self.state
            .account(address, &self.store)
            .unwrap()
            .map(|a| a.balance)
            .unwrap_or(0)
    }

    pub fn sequence(&self, address: &Address) -> u64 {
        self.state.account(address, &self.store).unwrap().unwrap().sequence
    }

    pub fn funds(&self) -> u128 {
        self.state.compute_total_funds(&self.store).unwrap()
    }
}

pub fn key(seed: u64) -> KeyPair {
    KeyPair::from_seed(seed).unwrap()
}

pub fn sign(key: &KeyPair, sequence: u64, action: Action) -> SignedTransaction {
    SignedTransaction::sign(key, Transaction::new(sequence, action)).unwrap()
}

pub fn transfer(key: &KeyPair, sequence: u64, target: Address, amount: u64) -> SignedTransaction {
    sign(key, sequence, Action::Transfer { target, amount })
}

pub fn block(timestamp: u64, txs: Vec<SignedTransaction>) -> Block {
    Block::new(timestamp, txs).unwrap()
}
