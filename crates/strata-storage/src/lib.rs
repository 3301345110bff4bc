//! # strata-storage
//!
//! Durable cell storage for Strata using RocksDB.
//!
//! This crate provides:
//! - [`Database`] - RocksDB wrapper with column families
//! - [`RocksStore`] - [`Store`](strata_data::Store) implementation keyed by cell hash,
//!   plus named roots for locating persisted states

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod db;
mod error;
mod store;

pub use db::{Database, DbConfig};
pub use error::{StorageError, StorageResult};
pub use store::RocksStore;
