//! # strata-state
//!
//! Immutable ledger state for Strata.
//!
//! A [`State`] is a snapshot of accounts, peers, the schedule of deferred
//! actions and the global values (timestamp, fee pool, juice price). Every
//! update returns a new snapshot that shares all untouched subtrees with
//! the old one, so historical states stay valid and cheap to keep.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod result;
pub mod schedule;
mod state;

pub use result::BlockResult;
pub use schedule::{ScheduledEntry, SCHEDULE_KEY_LEN};
pub use state::State;
