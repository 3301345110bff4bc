//! # strata-types
//!
//! Ledger types for Strata.
//!
//! This crate provides:
//! - [`AccountStatus`](account::AccountStatus) - balance, sequence and metadata of an account
//! - [`PeerStatus`](peer::PeerStatus) - peer stake and delegations
//! - [`SignedTransaction`](transaction::SignedTransaction) - signed actions
//! - [`Block`](block::Block) - timestamped batch of transactions
//! - [`TxResult`](result::TxResult) - per-transaction outcome
//!
//! Every type converts to and from its [`Cell`](strata_data::Cell) record
//! through [`ToCell`](strata_data::ToCell) and [`FromCell`](strata_data::FromCell).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod account;
pub mod block;
pub mod codec;
pub mod peer;
pub mod result;
pub mod transaction;

pub use account::AccountStatus;
pub use block::Block;
pub use codec::MAX_AMOUNT;
pub use peer::PeerStatus;
pub use result::{ErrorCode, TxResult};
pub use transaction::{Action, SignedTransaction, Transaction};
