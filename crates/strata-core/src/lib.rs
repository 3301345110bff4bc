//! # strata-core
//!
//! Deterministic block application for the Strata ledger.
//!
//! This crate ties the data model to ledger semantics:
//! - [`TransactionExecutor`] - the boundary between the applier and whatever
//!   runs an action; [`NativeExecutor`] handles the built-in actions
//! - [`BlockApplier`] - folds a block's signed transactions over a [`State`],
//!   charging fees and running due scheduled actions
//! - [`LedgerConfig`] and [`GenesisBuilder`] - initial state from TOML or JSON
//!
//! [`State`]: strata_state::State

#![warn(missing_docs)]
#![warn(clippy::all)]

mod applier;
pub mod config;
mod error;
pub mod executor;
mod genesis;

pub use applier::BlockApplier;
pub use config::{LedgerConfig, PeerConfig};
pub use error::{CoreError, CoreResult};
pub use executor::{Effect, ExecutionContext, NativeExecutor, Outcome, StateDelta, TransactionExecutor};
pub use genesis::GenesisBuilder;
