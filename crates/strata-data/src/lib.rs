//! # strata-data
//!
//! Content-addressed data model for the Strata ledger.
//!
//! This crate provides:
//! - [`Cell`] - immutable values with a canonical encoding and SHA3-256 hash
//! - [`Ref`] - handles to cells that are either embedded, in memory, or
//!   stored by hash and loaded lazily from a [`Store`]
//! - [`Vector`], [`BlobMap`], [`Record`] - structurally shared collections
//!
//! ## Encoding
//!
//! Every encoding starts with a tag byte (see [`tag`]). Integers use the
//! signed VLC format in [`vlc`]. A child value whose own encoding is at most
//! [`MAX_EMBEDDED_LENGTH`] bytes and which is a scalar is written inline;
//! any other child is written as `REF` followed by its 32-byte hash.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod blobmap;
mod cell;
mod error;
mod record;
mod refs;
mod store;
pub mod tag;
mod vector;
pub mod vlc;

pub use blobmap::{BlobMap, MapNode, MAX_KEY_LENGTH};
pub use cell::{Cell, Value, MAX_EMBEDDED_LENGTH};
pub use error::{DataError, DataResult};
pub use record::Record;
pub use refs::{Ref, RefStatus};
pub use store::{MemoryStore, Store};
pub use vector::{Vector, VectorNode, VECTOR_FANOUT};

pub use bytes::Bytes;
pub use strata_primitives::Hash;

/// Conversion of a typed value into its cell representation
pub trait ToCell {
    /// Build the cell for this value
    fn to_cell(&self) -> Cell;

    /// Build a reference to the cell for this value
    fn to_ref(&self) -> Ref {
        Ref::new(self.to_cell())
    }
}

/// Reconstruction of a typed value from its cell representation
pub trait FromCell: Sized {
    /// Rebuild the value, loading referenced children from `store` on demand
    fn from_cell(cell: &Cell, store: &dyn Store) -> DataResult<Self>;

    /// Resolve `r` and rebuild the value
    fn from_ref(r: &Ref, store: &dyn Store) -> DataResult<Self> {
        Self::from_cell(&r.resolve(store)?, store)
    }
}
